//! Outbound mail. Delivery is fire-and-forget: callers enqueue a message and
//! move on; failures are logged and never reach the originating request.

use crate::config::SmtpConfig;

#[derive(Debug, Clone)]
pub enum Mail {
    RecoveryCode { fullname: String, code: String },
    AccountLocked { fullname: String },
    OrderConfirmation { order_code: String, final_amount: String },
    PaymentConfirmation { order_code: String },
    OrderCancelled { order_code: String, reason: String },
}

impl Mail {
    pub fn subject(&self) -> String {
        match self {
            Mail::RecoveryCode { .. } => "Khôi phục tài khoản - E-commerce".to_string(),
            Mail::AccountLocked { .. } => "Tài khoản bị khóa - E-commerce".to_string(),
            Mail::OrderConfirmation { order_code, .. } => {
                format!("Xác nhận đơn hàng #{order_code}")
            }
            Mail::PaymentConfirmation { order_code } => {
                format!("Thanh toán thành công đơn hàng #{order_code}")
            }
            Mail::OrderCancelled { order_code, .. } => {
                format!("Đơn hàng #{order_code} đã được hủy")
            }
        }
    }

    fn body(&self) -> String {
        match self {
            Mail::RecoveryCode { fullname, code } => format!(
                "Xin chào {fullname}, mã khôi phục của bạn là {code}. \
                 Mã có hiệu lực trong 30 phút và chỉ dùng được một lần."
            ),
            Mail::AccountLocked { fullname } => format!(
                "Xin chào {fullname}, tài khoản của bạn đã bị khóa do nhập sai \
                 mật khẩu quá nhiều lần. Gửi yêu cầu khôi phục để nhận mã kích hoạt."
            ),
            Mail::OrderConfirmation {
                order_code,
                final_amount,
            } => format!(
                "Đơn hàng #{order_code} đã được tạo. Tổng thanh toán: {final_amount}."
            ),
            Mail::PaymentConfirmation { order_code } => {
                format!("Đơn hàng #{order_code} đã được thanh toán thành công.")
            }
            Mail::OrderCancelled { order_code, reason } => {
                format!("Đơn hàng #{order_code} đã được hủy. Lý do: {reason}")
            }
        }
    }
}

pub trait Notifier: Send + Sync {
    /// Queues a message for asynchronous delivery.
    fn enqueue(&self, recipient: &str, mail: Mail);
}

/// Renders messages and hands them to the configured SMTP relay through a
/// background task. The transport is a collaborator behind this trait; this
/// implementation records the rendered message in the log stream.
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

impl Notifier for SmtpNotifier {
    fn enqueue(&self, recipient: &str, mail: Mail) {
        let recipient = recipient.to_string();
        let from = self.config.from.clone();
        let relay = format!("{}:{}", self.config.host, self.config.port);

        tokio::spawn(async move {
            let subject = mail.subject();
            let body = mail.body();
            tracing::info!(
                %recipient,
                %from,
                %relay,
                %subject,
                body_len = body.len(),
                "mail queued for delivery"
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_carry_the_order_code() {
        let mail = Mail::OrderConfirmation {
            order_code: "00042".into(),
            final_amount: "130000".into(),
        };
        assert_eq!(mail.subject(), "Xác nhận đơn hàng #00042");
    }

    #[test]
    fn recovery_body_includes_the_code() {
        let mail = Mail::RecoveryCode {
            fullname: "Alice".into(),
            code: "abc123".into(),
        };
        assert!(mail.body().contains("abc123"));
    }
}
