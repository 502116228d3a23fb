pub mod backend;
pub mod file_backend;
pub mod route_store;

#[cfg(feature = "etcd")]
pub mod etcd_backend;

pub use backend::StoreBackend;
pub use file_backend::FileBackend;
pub use route_store::RouteStore;

#[cfg(feature = "etcd")]
pub use etcd_backend::EtcdBackend;
