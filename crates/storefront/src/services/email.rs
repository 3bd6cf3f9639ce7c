//! Email service for order confirmations and notifications.
//!
//! Sends through the `SendGrid` v3 HTTP API with Askama templates. When no
//! API key is configured every send is skipped with a debug log, so local
//! development works without credentials.

use askama::Template;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

use gerinmah_core::{Lang, OrderId};

use crate::config::EmailConfig;
use crate::models::{BankAccount, OrderWithItems};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// One rendered order line.
struct EmailLine {
    name: String,
    quantity: i32,
    unit_price: String,
    line_total: String,
}

/// Localized labels for the customer confirmation.
struct Labels {
    subject: &'static str,
    heading: &'static str,
    greeting: &'static str,
    intro: &'static str,
    total_label: &'static str,
    address_label: &'static str,
    date_label: &'static str,
    bank_label: &'static str,
}

impl Labels {
    const fn for_lang(lang: Lang) -> Self {
        match lang {
            Lang::Mn => Self {
                subject: "Таны захиалга хүлээн авлаа",
                heading: "Захиалга баталгаажлаа",
                greeting: "Сайн байна уу",
                intro: "Таны захиалгыг хүлээн авлаа. Захиалгын дугаар:",
                total_label: "Нийт дүн",
                address_label: "Хүргэлтийн хаяг",
                date_label: "Хүргэх өдөр",
                bank_label: "Төлбөр шилжүүлэх данс",
            },
            Lang::Ru => Self {
                subject: "Ваш заказ принят",
                heading: "Заказ подтверждён",
                greeting: "Здравствуйте",
                intro: "Мы получили ваш заказ. Номер заказа:",
                total_label: "Итого",
                address_label: "Адрес доставки",
                date_label: "Дата доставки",
                bank_label: "Счёт для оплаты",
            },
            Lang::En => Self {
                subject: "We received your order",
                heading: "Order confirmed",
                greeting: "Hello",
                intro: "Thank you for your order. Order number:",
                total_label: "Total",
                address_label: "Delivery address",
                date_label: "Delivery date",
                bank_label: "Pay by bank transfer to",
            },
        }
    }

    const fn lang_code(lang: Lang) -> &'static str {
        match lang {
            Lang::Mn => "mn",
            Lang::Ru => "ru",
            Lang::En => "en",
        }
    }
}

/// HTML template for the customer's order confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    lang_code: &'a str,
    heading: &'a str,
    greeting: &'a str,
    intro: &'a str,
    total_label: &'a str,
    address_label: &'a str,
    date_label: &'a str,
    bank_label: &'a str,
    customer_name: &'a str,
    order_id: OrderId,
    lines: &'a [EmailLine],
    total: &'a str,
    delivery_address: &'a str,
    delivery_date: Option<String>,
    bank: Option<&'a BankAccount>,
}

/// Plain text template for the customer's order confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    greeting: &'a str,
    intro: &'a str,
    total_label: &'a str,
    address_label: &'a str,
    date_label: &'a str,
    bank_label: &'a str,
    customer_name: &'a str,
    order_id: OrderId,
    lines: &'a [EmailLine],
    total: &'a str,
    delivery_address: &'a str,
    delivery_date: Option<String>,
    bank: Option<&'a BankAccount>,
}

/// Plain text notification sent to the shop on every new order.
#[derive(Template)]
#[template(path = "email/new_order.txt")]
struct NewOrderText<'a> {
    order_id: OrderId,
    customer_name: &'a str,
    customer_phone: &'a str,
    delivery_address: &'a str,
    delivery_date: Option<String>,
    notes: Option<&'a str>,
    lines: &'a [EmailLine],
    total: &'a str,
}

/// HTML template for the welcome email.
#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    username: &'a str,
    shop_url: &'a str,
}

/// Plain text template for the welcome email.
#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    username: &'a str,
    shop_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// Transport error talking to `SendGrid`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// `SendGrid` rejected the message.
    #[error("SendGrid returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Serialize)]
struct SendGridAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct SendGridPersonalization<'a> {
    to: [SendGridAddress<'a>; 1],
}

#[derive(Serialize)]
struct SendGridContent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Serialize)]
struct SendGridMessage<'a> {
    personalizations: [SendGridPersonalization<'a>; 1],
    from: SendGridAddress<'a>,
    subject: &'a str,
    content: Vec<SendGridContent<'a>>,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    http: reqwest::Client,
    api_key: Option<SecretString>,
    from_address: String,
    admin_notification: Option<String>,
    shop_url: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    #[must_use]
    pub fn new(http: reqwest::Client, config: &EmailConfig, shop_url: &str) -> Self {
        Self {
            http,
            api_key: config.sendgrid_api_key.clone(),
            from_address: config.from.clone(),
            admin_notification: config.admin_notification.clone(),
            shop_url: shop_url.to_string(),
        }
    }

    /// Whether a `SendGrid` key is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send the order confirmation to the customer (when they left an email)
    /// and a notification to the shop.
    ///
    /// # Errors
    ///
    /// Returns the first error; the shop notification is still attempted
    /// when the customer email fails.
    pub async fn send_order_emails(
        &self,
        order: &OrderWithItems,
        lang: Lang,
        bank: Option<&BankAccount>,
    ) -> Result<(), EmailError> {
        let lines = email_lines(order, lang);
        let total = format_amount(order.order.total_amount);

        let customer = match order.order.customer_email.as_deref() {
            Some(to) => {
                self.send_order_confirmation(to, order, lang, &lines, &total, bank)
                    .await
            }
            None => Ok(()),
        };

        let admin = match self.admin_notification.as_deref() {
            Some(to) => self.send_new_order_notification(to, order, &lines, &total).await,
            None => Ok(()),
        };

        customer.and(admin)
    }

    async fn send_order_confirmation(
        &self,
        to: &str,
        order: &OrderWithItems,
        lang: Lang,
        lines: &[EmailLine],
        total: &str,
        bank: Option<&BankAccount>,
    ) -> Result<(), EmailError> {
        let labels = Labels::for_lang(lang);
        let delivery_date = order.order.delivery_date.map(|d| d.to_string());

        let html = OrderConfirmationHtml {
            lang_code: Labels::lang_code(lang),
            heading: labels.heading,
            greeting: labels.greeting,
            intro: labels.intro,
            total_label: labels.total_label,
            address_label: labels.address_label,
            date_label: labels.date_label,
            bank_label: labels.bank_label,
            customer_name: &order.order.customer_name,
            order_id: order.order.id,
            lines,
            total,
            delivery_address: &order.order.delivery_address,
            delivery_date: delivery_date.clone(),
            bank,
        }
        .render()?;
        let text = OrderConfirmationText {
            greeting: labels.greeting,
            intro: labels.intro,
            total_label: labels.total_label,
            address_label: labels.address_label,
            date_label: labels.date_label,
            bank_label: labels.bank_label,
            customer_name: &order.order.customer_name,
            order_id: order.order.id,
            lines,
            total,
            delivery_address: &order.order.delivery_address,
            delivery_date,
            bank,
        }
        .render()?;

        let subject = format!("{} #{}", labels.subject, order.order.id);
        self.send(to, &subject, &text, Some(&html)).await
    }

    async fn send_new_order_notification(
        &self,
        to: &str,
        order: &OrderWithItems,
        lines: &[EmailLine],
        total: &str,
    ) -> Result<(), EmailError> {
        let text = NewOrderText {
            order_id: order.order.id,
            customer_name: &order.order.customer_name,
            customer_phone: &order.order.customer_phone,
            delivery_address: &order.order.delivery_address,
            delivery_date: order.order.delivery_date.map(|d| d.to_string()),
            notes: order.order.notes.as_deref(),
            lines,
            total,
        }
        .render()?;

        let subject = format!("Шинэ захиалга #{}", order.order.id);
        self.send(to, &subject, &text, None).await
    }

    /// Send a welcome email after registration.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome_email(&self, to: &str, username: &str) -> Result<(), EmailError> {
        let shop_url = self.shop_url.as_str();
        let html = WelcomeEmailHtml { username, shop_url }.render()?;
        let text = WelcomeEmailText { username, shop_url }.render()?;

        self.send(to, "Гэрийн махны дэлгүүрт тавтай морил", &text, Some(&html))
            .await
    }

    /// Post one message to `SendGrid`. Plain text always goes first.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: Option<&str>,
    ) -> Result<(), EmailError> {
        let Some(api_key) = &self.api_key else {
            tracing::debug!(to = %to, subject = %subject, "Email disabled, skipping send");
            return Ok(());
        };

        let mut content = vec![SendGridContent {
            kind: "text/plain",
            value: text_body,
        }];
        if let Some(html) = html_body {
            content.push(SendGridContent {
                kind: "text/html",
                value: html,
            });
        }

        let message = SendGridMessage {
            personalizations: [SendGridPersonalization {
                to: [SendGridAddress { email: to }],
            }],
            from: SendGridAddress {
                email: &self.from_address,
            },
            subject,
            content,
        };

        let response = self
            .http
            .post(SENDGRID_SEND_URL)
            .bearer_auth(api_key.expose_secret())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn email_lines(order: &OrderWithItems, lang: Lang) -> Vec<EmailLine> {
    order
        .items
        .iter()
        .map(|item| EmailLine {
            name: item.product_name(lang).to_string(),
            quantity: item.quantity,
            unit_price: format_amount(item.unit_price),
            line_total: format_amount(item.line_total()),
        })
        .collect()
}

/// Format a tögrög amount without trailing zero cents.
fn format_amount(amount: Decimal) -> String {
    amount.round_dp(2).normalize().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use gerinmah_core::{BankAccountId, OrderItemId, OrderStatus, ProductId};

    use super::*;
    use crate::models::{Order, OrderItem};

    fn order() -> OrderWithItems {
        let now = Utc::now();
        OrderWithItems {
            order: Order {
                id: OrderId::new(42),
                user_id: None,
                status: OrderStatus::Pending,
                total_amount: Decimal::new(5_500_000, 2),
                customer_name: "Бат".to_string(),
                customer_phone: "99112233".to_string(),
                customer_email: Some("bat@example.mn".to_string()),
                delivery_address: "БЗД, 3-р хороо".to_string(),
                delivery_date: None,
                notes: Some("<b>гэрт</b>".to_string()),
                payment_method: "bank_transfer".to_string(),
                created_at: now,
                updated_at: now,
            },
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(42),
                product_id: ProductId::new(7),
                quantity: 2,
                unit_price: Decimal::new(2_750_000, 2),
                product_name_mn: "Үхрийн мах".to_string(),
                product_name_ru: Some("Говядина".to_string()),
                product_name_en: None,
            }],
        }
    }

    #[test]
    fn test_format_amount_drops_zero_cents() {
        assert_eq!(format_amount(Decimal::new(5_500_000, 2)), "55000");
        assert_eq!(format_amount(Decimal::new(1_250, 2)), "12.5");
    }

    #[test]
    fn test_email_lines_use_requested_language() {
        let lines = email_lines(&order(), Lang::Ru);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].name, "Говядина");
        assert_eq!(lines[0].line_total, "55000");

        // Missing translation falls back to Mongolian
        let lines = email_lines(&order(), Lang::En);
        assert_eq!(lines[0].name, "Үхрийн мах");
    }

    #[test]
    fn test_order_confirmation_renders_bank_details() {
        let order = order();
        let lines = email_lines(&order, Lang::Mn);
        let labels = Labels::for_lang(Lang::Mn);
        let bank = BankAccount {
            id: BankAccountId::new(1),
            bank_name: "Хаан банк".to_string(),
            account_number: "5000123456".to_string(),
            account_holder: "Гэрийн мах ХХК".to_string(),
            is_default: true,
            created_at: Utc::now(),
        };
        let text = OrderConfirmationText {
            greeting: labels.greeting,
            intro: labels.intro,
            total_label: labels.total_label,
            address_label: labels.address_label,
            date_label: labels.date_label,
            bank_label: labels.bank_label,
            customer_name: &order.order.customer_name,
            order_id: order.order.id,
            lines: &lines,
            total: "55000",
            delivery_address: &order.order.delivery_address,
            delivery_date: None,
            bank: Some(&bank),
        }
        .render()
        .unwrap();

        assert!(text.contains("#42"));
        assert!(text.contains("Үхрийн мах: 2 x 27500 = 55000"));
        assert!(text.contains("5000123456"));
        assert!(!text.contains(labels.date_label));
    }

    #[test]
    fn test_admin_notification_escapes_nothing_in_text() {
        let order = order();
        let lines = email_lines(&order, Lang::Mn);
        let text = NewOrderText {
            order_id: order.order.id,
            customer_name: &order.order.customer_name,
            customer_phone: &order.order.customer_phone,
            delivery_address: &order.order.delivery_address,
            delivery_date: None,
            notes: order.order.notes.as_deref(),
            lines: &lines,
            total: "55000",
        }
        .render()
        .unwrap();

        assert!(text.contains("99112233"));
        assert!(text.contains("<b>гэрт</b>"));
    }

    #[tokio::test]
    async fn test_send_without_key_is_noop() {
        let config = EmailConfig {
            sendgrid_api_key: None,
            from: "noreply@gerinmah.mn".to_string(),
            admin_notification: Some("shop@gerinmah.mn".to_string()),
        };
        let service = EmailService::new(reqwest::Client::new(), &config, "https://gerinmah.mn");
        assert!(!service.is_enabled());
        service.send_order_emails(&order(), Lang::Mn, None).await.unwrap();
    }
}
