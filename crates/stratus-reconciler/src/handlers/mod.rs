pub mod autoscale;
pub mod sql_server;
