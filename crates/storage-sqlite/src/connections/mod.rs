pub mod repository;

pub use repository::ConnectionRepository;
