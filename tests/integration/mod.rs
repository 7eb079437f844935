mod config_loading;
mod failover_polling;
mod keystore_concurrency;
mod keystore_persistence;
mod logpoller_rocks;
mod rocks_orm;
