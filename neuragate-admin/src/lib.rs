//! Admin REST surface (§6 "Admin REST (collaborator)"): list/put/delete
//! on top of `neuragate_store::RouteStore`. Scoped to exactly the three
//! operations the interface names — no validation UI, auth layer, or
//! service/upstream/consumer/SSL management.

pub mod handlers;
pub mod server;

pub use server::{build_router, AdminState};
