//! External service traits with in-memory and VK implementations.

pub mod compliance;
pub mod media_host;
pub mod payment;
pub mod vk;

pub use compliance::{
    AdRegistration, ComplianceAuthority, InMemoryComplianceAuthority, VK_MAX_AD_TEXT,
};
pub use media_host::{HostedPost, InMemoryMediaHost, MediaHost, MediaRef, UploadTarget};
pub use payment::{
    PaymentGateway, PaymentInitiation, RedirectGateway, VkPayGateway, VkPayOrder,
};
pub use vk::{VK_API_URL, VK_API_VERSION, VkApi, VkOrdClient, VkWallClient};
