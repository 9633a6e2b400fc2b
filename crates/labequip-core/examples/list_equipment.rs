use anyhow::Context;
use labequip_core::prelude::*;
use std::env;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: list_equipment <config.xml> [manufacturer]");
        return Ok(());
    }

    let config = Config::new(&args[1]).with_context(|| format!("loading {}", args[1]))?;
    let db = config.database()?;
    println!("Loaded {} records from {} source(s)", db.len(), db.sources().len());

    let mut filters = Filters::new();
    if let Some(manufacturer) = args.get(2) {
        filters = filters.with("manufacturer", manufacturer.as_str());
    }

    println!("\nRecords:");
    for record in db.records(&filters)? {
        println!("  - {}", record);
    }

    println!("\nConnections:");
    for connection in db.connections(&filters)? {
        let class = find_resource_class(connection).map_or("-", |c| c.name);
        println!("  - {} [{}]", connection, class);
    }

    println!("\nEquipment:");
    for (key, record) in db.equipment().iter() {
        println!("  {}: {}", key, record);
    }
    Ok(())
}
