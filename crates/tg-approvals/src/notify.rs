// notify.rs — Chat notification for new pending approvals.
//
// Posts an interactive approve/deny message to the configured chat
// webhook. The button `value` carries the pending id; the chat platform
// echoes it back through the signed callback. Delivery is best-effort:
// an unreachable webhook is logged and the approval flow continues
// (approvers can still use signed URLs or the API).

use serde_json::json;

/// Posts approval requests to a chat webhook, when configured.
pub struct ChatNotifier {
    webhook_url: Option<String>,
    http: reqwest::Client,
}

impl ChatNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url: webhook_url.filter(|u| !u.is_empty()),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("reqwest client builds"),
        }
    }

    /// Annotate a summary with the quorum when more than one approval is
    /// needed.
    pub fn summarize(summary: &str, required_approvals: u32) -> String {
        if required_approvals > 1 {
            format!("{summary} (needs {required_approvals} approvals)")
        } else {
            summary.to_string()
        }
    }

    /// Send the approval request message. No-op (with a warning) when no
    /// webhook is configured.
    pub async fn request_approval(&self, pending_id: &str, summary: &str) {
        let Some(url) = &self.webhook_url else {
            tracing::warn!(pending_id = %pending_id, summary = %summary,
                "no chat webhook configured for approval request");
            return;
        };

        let payload = json!({
            "text": format!("Approval required: {summary}"),
            "blocks": [
                {
                    "type": "section",
                    "text": {"type": "mrkdwn", "text": format!("*Approval Required*\n{summary}")}
                },
                {
                    "type": "actions",
                    "elements": [
                        {
                            "type": "button",
                            "text": {"type": "plain_text", "text": "Approve"},
                            "style": "primary",
                            "action_id": "approve",
                            "value": pending_id,
                        },
                        {
                            "type": "button",
                            "text": {"type": "plain_text", "text": "Deny"},
                            "style": "danger",
                            "action_id": "deny",
                            "value": pending_id,
                        }
                    ]
                }
            ]
        });

        match self.http.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                tracing::error!(pending_id = %pending_id, status = %resp.status(),
                    "chat approval request rejected");
            }
            Err(e) => {
                tracing::error!(pending_id = %pending_id, error = %e,
                    "failed to send chat approval request");
            }
        }
    }
}
