use schemagate_api::db::{DbClient, DbConfig};

pub fn test_db_client() -> DbClient {
    let config = DbConfig::from_env();
    DbClient::from_config(&config).expect("Failed to create database client")
}

/// Client whose pool hands out at most `max_size` connections.
pub fn test_db_client_with_pool_size(max_size: usize) -> DbClient {
    let config = DbConfig {
        max_size,
        ..DbConfig::from_env()
    };
    DbClient::from_config(&config).expect("Failed to create database client")
}
