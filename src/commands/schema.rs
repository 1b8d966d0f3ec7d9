use super::{open_store, with_credentials};
use anyhow::Result;
use transparency::{config::Config, store::schema::SCHEMA};

pub async fn create_schema(config: Config) -> Result<()> {
    let config = with_credentials(config)?;
    open_store(&config).await?;
    println!("Schema ready: {} tables", SCHEMA.len());
    Ok(())
}
