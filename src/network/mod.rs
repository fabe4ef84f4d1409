pub mod balancer;
pub mod connector;
pub mod gateway;
pub mod jsonrpc;
pub mod pool;
pub mod rpc;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use balancer::Balancer;
pub use connector::NodeConnector;
pub use gateway::{Connector, Endpoint, LedgerNode, TransactionSink, Transport};
pub use jsonrpc::JsonRpcClient;
pub use pool::{ConnectionPool, PoolOptions, PooledConnection};
pub use rpc::RpcClient;
