pub mod repository;

pub use repository::ConnectionRequestRepository;
