//! Payment initiation payloads returned from order creation.

use std::sync::Arc;

use domain::Order;
use serde::Serialize;

/// Characters of post text quoted in the VK Pay description.
const DESCRIPTION_EXCERPT_CHARS: usize = 100;

/// Order payload for the VK Pay widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VkPayOrder {
    pub item: String,
    pub description: String,

    /// Amount in minor currency units.
    pub amount: i64,
}

/// What the client needs to start paying for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInitiation {
    /// Pay inside VK with the widget payload.
    VkPay(VkPayOrder),

    /// Pay on an external page.
    External { payment_url: String },
}

impl PaymentInitiation {
    /// Wire name of the payment type.
    pub fn payment_type(&self) -> &'static str {
        match self {
            Self::VkPay(_) => "vk_pay",
            Self::External { .. } => "external",
        }
    }

    pub fn vk_order(&self) -> Option<&VkPayOrder> {
        match self {
            Self::VkPay(order) => Some(order),
            Self::External { .. } => None,
        }
    }

    pub fn payment_url(&self) -> Option<&str> {
        match self {
            Self::VkPay(_) => None,
            Self::External { payment_url } => Some(payment_url),
        }
    }
}

/// Produces the payment-initiation payload for a new order.
pub trait PaymentGateway: Send + Sync {
    fn initiate(&self, order: &Order) -> PaymentInitiation;
}

impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    fn initiate(&self, order: &Order) -> PaymentInitiation {
        (**self).initiate(order)
    }
}

/// VK Pay widget payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct VkPayGateway;

impl PaymentGateway for VkPayGateway {
    fn initiate(&self, order: &Order) -> PaymentInitiation {
        let excerpt: String = order.text.chars().take(DESCRIPTION_EXCERPT_CHARS).collect();
        PaymentInitiation::VkPay(VkPayOrder {
            item: format!("Размещение поста в группе {}", order.group_id),
            description: format!("Публикация поста в сообществе. Текст: {excerpt}..."),
            amount: order.price.minor_units(),
        })
    }
}

/// Redirects to an external payment page under the frontend.
#[derive(Debug, Clone)]
pub struct RedirectGateway {
    frontend_url: String,
}

impl RedirectGateway {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into(),
        }
    }
}

impl PaymentGateway for RedirectGateway {
    fn initiate(&self, order: &Order) -> PaymentInitiation {
        PaymentInitiation::External {
            payment_url: format!(
                "{}/payment/{}",
                self.frontend_url.trim_end_matches('/'),
                order.id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{NewOrder, Price};

    fn order(text: &str) -> Order {
        Order::pending(&NewOrder::new(text, 42).with_price("150.5".parse::<Price>().unwrap()))
            .unwrap()
    }

    #[test]
    fn test_vk_pay_payload() {
        let order = order("Buy now");
        let payment = VkPayGateway.initiate(&order);

        assert_eq!(payment.payment_type(), "vk_pay");
        assert!(payment.payment_url().is_none());
        let vk = payment.vk_order().unwrap();
        assert_eq!(vk.amount, 15050);
        assert_eq!(vk.item, "Размещение поста в группе 42");
        assert!(vk.description.ends_with("Buy now..."));
    }

    #[test]
    fn test_vk_pay_description_is_truncated_by_chars() {
        let order = order(&"ж".repeat(150));
        let payment = VkPayGateway.initiate(&order);
        let description = &payment.vk_order().unwrap().description;
        assert_eq!(description.matches('ж').count(), 100);
    }

    #[test]
    fn test_redirect_payload() {
        let order = order("Buy now");
        let payment = RedirectGateway::new("http://localhost:3000/").initiate(&order);

        assert_eq!(payment.payment_type(), "external");
        assert!(payment.vk_order().is_none());
        assert_eq!(
            payment.payment_url().unwrap(),
            format!("http://localhost:3000/payment/{}", order.id)
        );
    }
}
