//! Order lifecycle orchestration for paid community posts.
//!
//! This crate drives an order through its three stages:
//! 1. Intake: validate, persist as `pending`, return a payment payload
//! 2. Payment confirmation: compare-and-set `pending -> paid`
//! 3. Publication: resolve the ERID, upload media best-effort, post, and
//!    compare-and-set `paid -> published`
//!
//! External systems (compliance authority, media host, payment provider)
//! sit behind traits with in-memory and VK implementations.

pub mod controller;
pub mod error;
pub mod publisher;
pub mod resolver;
pub mod services;

pub use controller::{CreatedOrder, OrderLifecycleController, PublishOutcome};
pub use error::{ComplianceError, LifecycleError, MediaHostError, Result};
pub use publisher::{MediaPublisher, PublishedPost, UploadBatch, UploadOutcome};
pub use resolver::{ErdResolver, ResolvedErid};
pub use services::{
    AdRegistration, ComplianceAuthority, HostedPost, InMemoryComplianceAuthority,
    InMemoryMediaHost, MediaHost, MediaRef, PaymentGateway, PaymentInitiation, RedirectGateway,
    UploadTarget, VkApi, VkOrdClient, VkPayGateway, VkPayOrder, VkWallClient,
};
