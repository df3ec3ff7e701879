//! Email notifications over SMTP.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use docreq_common::{
    config::{EmailConfig, SmtpSecurity},
    AppError, AppResult,
};

use super::notification::{
    DigitalDocument, NewRequestAlert, NotificationDispatcher, RequestConfirmation, StatusUpdate,
};

/// A file attached to an email.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// Recipient addresses
    pub to: Vec<String>,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html_body: String,
    /// Optional attached file
    pub attachment: Option<EmailAttachment>,
}

/// Renders the Thai HTML emails.
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    site_name: String,
    site_url: String,
}

impl EmailTemplates {
    #[must_use]
    pub fn new(site_name: impl Into<String>, site_url: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            site_url: site_url.into().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn request_confirmation(&self, data: &RequestConfirmation) -> (String, String) {
        let subject = format!("ยืนยันการขอเอกสาร #{}", data.reference);
        let body = format!(
            "<h2 style=\"color: #3f51b5;\">ยืนยันการขอเอกสาร</h2>\
            <p>เรียน นักศึกษา,</p>\
            <p>ระบบได้รับคำขอเอกสารของคุณเรียบร้อยแล้ว โดยมีรายละเอียดดังนี้:</p>\
            <div style=\"background-color: #f5f5f5; padding: 15px; border-radius: 5px; margin: 20px 0;\">\
            <p><strong>เลขที่คำขอ:</strong> {}</p>\
            <p><strong>ประเภทเอกสาร:</strong> {}</p>\
            <p><strong>จำนวน:</strong> {} ฉบับ</p>\
            <p><strong>วิธีรับเอกสาร:</strong> {}</p>\
            <p><strong>วันที่ขอ:</strong> {}</p>\
            <p><strong>ระยะเวลาดำเนินการโดยประมาณ:</strong> {} วันทำการ (ประมาณวันที่ {})</p>\
            </div>{}",
            escape_html(&data.reference),
            escape_html(&data.document_type),
            data.copies,
            escape_html(&data.delivery_method),
            escape_html(&data.request_date),
            data.estimated_days,
            escape_html(&data.estimated_date),
            self.tracking_link(&data.reference),
        );
        (subject, self.wrap_html(&body))
    }

    #[must_use]
    pub fn status_update(&self, data: &StatusUpdate) -> (String, String) {
        let subject = format!("อัพเดทสถานะคำขอ #{}", data.reference);
        let message = data
            .message
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(|m| format!("<p><strong>ข้อความเพิ่มเติม:</strong> {}</p>", escape_html(m)))
            .unwrap_or_default();
        let body = format!(
            "<h2 style=\"color: #3f51b5;\">อัพเดทสถานะคำขอเอกสาร</h2>\
            <p>เรียน นักศึกษา,</p>\
            <p>คำขอเอกสารของคุณมีการเปลี่ยนแปลงสถานะ โดยมีรายละเอียดดังนี้:</p>\
            <div style=\"background-color: #f5f5f5; padding: 15px; border-radius: 5px; margin: 20px 0;\">\
            <p><strong>เลขที่คำขอ:</strong> {}</p>\
            <p><strong>ประเภทเอกสาร:</strong> {}</p>\
            <p><strong>สถานะเดิม:</strong> {}</p>\
            <p><strong>สถานะใหม่:</strong> {}</p>\
            <p><strong>วันที่อัพเดท:</strong> {}</p>\
            {message}\
            </div>{}",
            escape_html(&data.reference),
            escape_html(&data.document_type),
            escape_html(&data.old_status),
            escape_html(&data.new_status),
            escape_html(&data.update_date),
            self.tracking_link(&data.reference),
        );
        (subject, self.wrap_html(&body))
    }

    #[must_use]
    pub fn digital_document(&self, data: &DigitalDocument) -> (String, String) {
        let subject = format!("เอกสารดิจิทัลของคุณ #{}", data.reference);
        let message = data
            .message
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(|m| format!("<p><strong>ข้อความจากเจ้าหน้าที่:</strong> {}</p>", escape_html(m)))
            .unwrap_or_default();
        let body = format!(
            "<h2 style=\"color: #3f51b5;\">จัดส่งเอกสารดิจิทัล</h2>\
            <p>เรียน นักศึกษา,</p>\
            <p>เอกสารที่คุณขอได้จัดทำเสร็จเรียบร้อยแล้ว และแนบมากับอีเมลฉบับนี้</p>\
            <div style=\"background-color: #f5f5f5; padding: 15px; border-radius: 5px; margin: 20px 0;\">\
            <p><strong>เลขที่คำขอ:</strong> {}</p>\
            <p><strong>ประเภทเอกสาร:</strong> {}</p>\
            <p><strong>จำนวน:</strong> {} ฉบับ</p>\
            <p><strong>วันที่ดำเนินการเสร็จ:</strong> {}</p>\
            {message}\
            </div>",
            escape_html(&data.reference),
            escape_html(&data.document_type),
            data.copies,
            escape_html(&data.completed_date),
        );
        (subject, self.wrap_html(&body))
    }

    #[must_use]
    pub fn new_request_alert(&self, data: &NewRequestAlert) -> (String, String) {
        let subject = format!("[แจ้งเตือน] มีคำขอเอกสารใหม่ #{}", data.reference);
        let body = format!(
            "<h2 style=\"color: #3f51b5;\">แจ้งเตือนคำขอเอกสารใหม่</h2>\
            <div style=\"background-color: #f5f5f5; padding: 15px; border-radius: 5px; margin: 20px 0;\">\
            <p><strong>เลขที่คำขอ:</strong> {}</p>\
            <p><strong>นักศึกษา:</strong> {} ({})</p>\
            <p><strong>ประเภทเอกสาร:</strong> {}</p>\
            <p><strong>จำนวน:</strong> {} ฉบับ</p>\
            <p><strong>วิธีรับเอกสาร:</strong> {}</p>\
            <p><strong>วันที่ขอ:</strong> {}</p>\
            </div>",
            escape_html(&data.reference),
            escape_html(&data.student_name),
            escape_html(&data.student_number),
            escape_html(&data.document_type),
            data.copies,
            escape_html(&data.delivery_method),
            escape_html(&data.request_date),
        );
        (subject, self.wrap_html(&body))
    }

    fn tracking_link(&self, reference: &str) -> String {
        format!(
            "<p>คุณสามารถติดตามสถานะคำขอได้ที่ \
            <a href=\"{}/student/track-status?ref={}\" style=\"color: #3f51b5;\">ระบบติดตามคำขอเอกสาร</a></p>",
            self.site_url,
            escape_html(reference)
        )
    }

    /// Wrap HTML content in the common email layout.
    fn wrap_html(&self, content: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body>
<div style="font-family: 'Sarabun', 'THSarabun', sans-serif; max-width: 600px; margin: 0 auto;">
    {}
    <div style="margin-top: 30px; padding-top: 20px; border-top: 1px solid #eee; font-size: 0.9em; color: #666;">
        <p>อีเมลนี้เป็นการแจ้งเตือนอัตโนมัติจาก <a href="{}">{}</a> กรุณาอย่าตอบกลับ</p>
    </div>
</div>
</body>
</html>"#,
            content,
            self.site_url,
            escape_html(&self.site_name)
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// SMTP notification dispatcher.
pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    templates: EmailTemplates,
}

impl SmtpDispatcher {
    /// Build the SMTP transport from configuration.
    pub fn from_config(config: &EmailConfig, site_url: &str) -> AppResult<Self> {
        let builder = match config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?,
            SmtpSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?
            }
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        }
        .port(config.port);

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        let address = config
            .from_address
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid sender address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from: Mailbox::new(Some(config.from_name.clone()), address),
            templates: EmailTemplates::new(config.from_name.clone(), site_url),
        })
    }

    /// Send an email.
    pub async fn send(&self, message: EmailMessage) -> AppResult<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.clone());

        for to in &message.to {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|e| AppError::Validation(format!("Invalid recipient {to}: {e}")))?;
            builder = builder.to(mailbox);
        }

        let email = match message.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .or_else(|_| ContentType::parse("application/octet-stream"))
                    .map_err(|e| AppError::Internal(format!("Invalid content type: {e}")))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::html(message.html_body))
                        .singlepart(
                            Attachment::new(attachment.file_name)
                                .body(attachment.content, content_type),
                        ),
                )
            }
            None => builder
                .header(ContentType::TEXT_HTML)
                .body(message.html_body),
        }
        .map_err(|e| AppError::Internal(format!("Failed to build email: {e}")))?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| AppError::DependencyFailure(format!("SMTP send failed: {e}")))?;

        tracing::info!(
            to = ?message.to,
            subject = %message.subject,
            code = %response.code(),
            "Email sent"
        );
        Ok(())
    }

    fn message(&self, to: Vec<String>, (subject, html_body): (String, String)) -> EmailMessage {
        EmailMessage {
            to,
            subject,
            html_body,
            attachment: None,
        }
    }
}

#[async_trait]
impl NotificationDispatcher for SmtpDispatcher {
    async fn send_request_confirmation(
        &self,
        to: &str,
        data: &RequestConfirmation,
    ) -> AppResult<()> {
        let message = self.message(vec![to.to_string()], self.templates.request_confirmation(data));
        self.send(message).await
    }

    async fn send_status_update(&self, to: &str, data: &StatusUpdate) -> AppResult<()> {
        let message = self.message(vec![to.to_string()], self.templates.status_update(data));
        self.send(message).await
    }

    async fn send_digital_document(&self, to: &str, data: &DigitalDocument) -> AppResult<()> {
        let mut message = self.message(vec![to.to_string()], self.templates.digital_document(data));
        message.attachment = Some(EmailAttachment {
            file_name: data.file_name.clone(),
            content_type: data.content_type.clone(),
            content: data.content.clone(),
        });
        self.send(message).await
    }

    async fn send_new_request_alert(
        &self,
        to: &[String],
        data: &NewRequestAlert,
    ) -> AppResult<()> {
        if to.is_empty() {
            return Ok(());
        }
        let message = self.message(to.to_vec(), self.templates.new_request_alert(data));
        self.send(message).await
    }
}
