pub mod also_energy;
pub mod device_registry;
pub mod http;
pub mod kmc;
pub mod retry;

pub use also_energy::{AlsoEnergyAdapter, AlsoEnergyConfig, AlsoEnergyTokenFetcher};
pub use device_registry::HttpDeviceRegistry;
pub use kmc::{KmcAdapter, KmcConfig};
pub use retry::{retry, RetryPolicy};
