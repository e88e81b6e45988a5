pub mod docker_hub;

pub use docker_hub::RegistryDockerHub;
