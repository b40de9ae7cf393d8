use super::RowContext;
use serde::{Deserialize, Serialize};

const BOUNDARY: &str = "_000_tabletalk_alternative_boundary_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailFields {
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub body: String,
    pub read_receipt: String,
    pub delivery_receipt: String,
}

impl Default for EmailFields {
    fn default() -> Self {
        Self {
            from: "{from}".to_string(),
            to: "{to}".to_string(),
            cc: "{cc}".to_string(),
            bcc: "{bcc}".to_string(),
            subject: "{subject}".to_string(),
            body: "{body}".to_string(),
            read_receipt: String::new(),
            delivery_receipt: String::new(),
        }
    }
}

impl EmailFields {
    pub fn render(&self, context: &RowContext<'_>) -> Self {
        Self {
            from: context.substitute(&self.from),
            to: context.substitute(&self.to),
            cc: context.substitute(&self.cc),
            bcc: context.substitute(&self.bcc),
            subject: context.substitute(&self.subject),
            body: context.substitute(&self.body),
            read_receipt: context.substitute(&self.read_receipt),
            delivery_receipt: context.substitute(&self.delivery_receipt),
        }
    }
}

pub fn build_eml(fields: &EmailFields) -> String {
    let mut headers = vec![
        "X-Unsent: 1".to_string(),
        format!("From: {}", fields.from),
        format!("To: {}", fields.to),
        format!("Cc: {}", fields.cc),
        format!("Bcc: {}", fields.bcc),
        format!("Subject: {}", fields.subject),
    ];
    if !fields.read_receipt.trim().is_empty() {
        headers.push(format!("Disposition-Notification-To: {}", fields.read_receipt));
    }
    if !fields.delivery_receipt.trim().is_empty() {
        headers.push(format!("Return-Receipt-To: {}", fields.delivery_receipt));
    }
    headers.push(format!("Thread-Topic: {}", fields.subject));
    headers.push("Content-Language: en-US".to_string());
    headers.push("Content-Type: multipart/alternative;".to_string());
    headers.push(format!("\tboundary=\"{BOUNDARY}\""));
    headers.push("MIME-Version: 1.0".to_string());

    let body = &fields.body;
    format!(
        "{headers}

--{BOUNDARY}
Content-Type: text/plain; charset=\"iso-8859-1\"
Content-Transfer-Encoding: quoted-printable

{body}

--{BOUNDARY}
Content-Type: text/html; charset=\"iso-8859-1\"
Content-Transfer-Encoding: quoted-printable

<html>
<head>
<meta http-equiv=\"Content-Type\" content=\"text/html; charset=iso-8859-1\">
</head>
<body dir=\"ltr\">
<div>{body}</div>
</body>
</html>

--{BOUNDARY}--",
        headers = headers.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::{build_eml, EmailFields, BOUNDARY};
    use crate::table::Table;
    use crate::template::Template;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    fn contacts() -> Table {
        Table::new(
            row(&["name", "email"]),
            vec![row(&["Alice", "alice@example.com"])],
        )
    }

    fn greeting() -> EmailFields {
        EmailFields {
            from: "me@example.com".to_string(),
            to: "{email}".to_string(),
            cc: String::new(),
            bcc: String::new(),
            subject: "Hi {name}".to_string(),
            body: "Hello {name}, row {#}".to_string(),
            read_receipt: String::new(),
            delivery_receipt: String::new(),
        }
    }

    #[test]
    fn email_template_substitutes_every_field() {
        let documents = Template::Email(greeting()).render(&contacts());
        assert_eq!(documents.len(), 1);

        let eml = &documents[0];
        assert!(eml.starts_with("X-Unsent: 1\nFrom: me@example.com\nTo: alice@example.com\n"));
        assert!(eml.contains("Subject: Hi Alice\n"));
        assert!(eml.contains("Thread-Topic: Hi Alice\n"));
        assert!(eml.contains("\n\nHello Alice, row 1\n\n"));
        assert!(eml.contains("<div>Hello Alice, row 1</div>"));
        assert!(eml.ends_with(&format!("--{BOUNDARY}--")));
    }

    #[test]
    fn receipts_only_appear_when_set() {
        let eml = build_eml(&greeting());
        assert!(!eml.contains("Disposition-Notification-To"));
        assert!(!eml.contains("Return-Receipt-To"));
        assert!(!eml.contains("\n\nThread-Topic"));

        let mut fields = greeting();
        fields.read_receipt = "{email}".to_string();
        let eml = &Template::Email(fields).render(&contacts())[0];
        assert!(eml.contains("Disposition-Notification-To: alice@example.com\n"));
        assert!(!eml.contains("Return-Receipt-To"));
    }

    #[test]
    fn receipt_rendering_to_empty_is_omitted() {
        let mut fields = greeting();
        fields.delivery_receipt = "{missing}".to_string();
        let eml = &Template::Email(fields).render(&contacts())[0];
        assert!(!eml.contains("Return-Receipt-To"));
    }

    #[test]
    fn persisted_fields_use_camel_case_receipts() {
        let fields: EmailFields =
            serde_json::from_str(r#"{"to":"{email}","readReceipt":"x@y.z"}"#)
                .expect("email fields should parse");
        assert_eq!(fields.to, "{email}");
        assert_eq!(fields.read_receipt, "x@y.z");
        assert_eq!(fields.from, "{from}");
    }
}
