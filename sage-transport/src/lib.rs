//! ABOUTME: HTTP and gRPC surfaces over the Request Coordinator

pub mod grpc;
pub mod http;

pub use grpc::proto::sage_server::SageServer;
pub use grpc::SageService;
pub use http::build_router;
