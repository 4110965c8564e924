//! Email templates rendered from the outbox payload.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    /// Adopter notice when a reviewer changes their application status
    ApplicationStatus,
    /// Link a vet follows to approve or reject a medical release
    VetApprovalRequest,
    /// Requester notice when a transfer is approved or rejected
    TransferDecision,
}

impl EmailTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailTemplate::ApplicationStatus => "application_status",
            EmailTemplate::VetApprovalRequest => "vet_approval_request",
            EmailTemplate::TransferDecision => "transfer_decision",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "application_status" => Some(EmailTemplate::ApplicationStatus),
            "vet_approval_request" => Some(EmailTemplate::VetApprovalRequest),
            "transfer_decision" => Some(EmailTemplate::TransferDecision),
            _ => None,
        }
    }

    /// Subject and HTML body. Missing payload fields render as empty strings.
    pub fn render(&self, payload: &Value) -> (String, String) {
        let field = |key: &str| -> String {
            match payload.get(key) {
                Some(Value::String(s)) => escape_html(s),
                Some(Value::Null) | None => String::new(),
                Some(other) => escape_html(&other.to_string()),
            }
        };

        match self {
            EmailTemplate::ApplicationStatus => {
                let pet = field("pet_name");
                let status = field("status");
                let subject = format!("Your application for {} is now {}", pet, status);
                let mut html = format!(
                    "<p>Hi {},</p><p>Your adoption application for <strong>{}</strong> is now <strong>{}</strong>.</p>",
                    field("adopter_name"),
                    pet,
                    status
                );
                let notes = field("notes");
                if !notes.is_empty() {
                    html.push_str(&format!("<p>Note from the shelter: {}</p>", notes));
                }
                (subject, html)
            }
            EmailTemplate::VetApprovalRequest => {
                let pet = field("pet_name");
                let subject = format!("Medical release requested for {}", pet);
                let html = format!(
                    "<p>{} has asked you to review the medical hold for <strong>{}</strong>.</p>\
                     <p><a href=\"{}\">Approve or reject the release</a></p>",
                    field("shelter_name"),
                    pet,
                    field("decision_url")
                );
                (subject, html)
            }
            EmailTemplate::TransferDecision => {
                let pet = field("pet_name");
                let decision = field("decision");
                let subject = format!("Transfer of {} was {}", pet, decision);
                let html = format!(
                    "<p>The transfer of <strong>{}</strong> to {} was <strong>{}</strong>.</p><p>{}</p>",
                    pet,
                    field("to_shelter_name"),
                    decision,
                    field("note")
                );
                (subject, html)
            }
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
