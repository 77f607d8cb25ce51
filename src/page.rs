//! Renders the status page shown when no message is submitted.

use crate::config::ContactConfig;
use std::fmt::Write;

/// Escapes text for safe interpolation into HTML element content and
/// double-quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// A clickable way to reach the contact, outside of paging.
#[derive(Debug, PartialEq, Eq)]
pub struct ContactLink {
    pub label: &'static str,
    pub href: String,
    pub text: String,
}

/// Builds links for every configured contact field, in display order.
pub fn contact_links(contact: &ContactConfig) -> Vec<ContactLink> {
    let fields: [(&'static str, &Option<String>, fn(&str) -> String); 5] = [
        ("Call", &contact.phone, |v| format!("tel:{}", v)),
        ("Text", &contact.sms, |v| format!("sms:{}", v)),
        ("iMessage", &contact.imessage, |v| format!("imessage:{}", v)),
        ("WhatsApp", &contact.whatsapp, |v| {
            let digits: String = v.chars().filter(char::is_ascii_digit).collect();
            format!("https://wa.me/{}", digits)
        }),
        ("Email", &contact.page_email, |v| format!("mailto:{}", v)),
    ];

    fields
        .into_iter()
        .filter_map(|(label, value, href)| {
            let value = value.as_deref()?.trim();
            if value.is_empty() {
                return None;
            }
            Some(ContactLink {
                label,
                href: href(value),
                text: value.to_string(),
            })
        })
        .collect()
}

/// Renders the page-submission form and contact details.
pub fn render_status_page(contact: &ContactConfig) -> String {
    let who = contact
        .short_name
        .as_deref()
        .or(contact.name.as_deref())
        .unwrap_or("on-call");

    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Page {who}</title>
</head>
<body>
<h1>Page {who}</h1>
<form method="post" action="/">
<textarea name="m" rows="4" cols="40"
 placeholder="What's wrong, what's affected, who you are, how to reach you"></textarea>
<p>
<button type="submit">Send page</button>
<button type="submit" formaction="/suggest">Suggest improvements</button>
</p>
</form>
"#,
        who = escape(who),
    );

    let links = contact_links(contact);
    if !links.is_empty() {
        let name = contact.name.as_deref().unwrap_or(who);
        let _ = writeln!(html, "<h2>Other ways to reach {}</h2>\n<ul>", escape(name));
        for link in links {
            let _ = writeln!(
                html,
                r#"<li>{}: <a href="{}">{}</a></li>"#,
                link.label,
                escape(&link.href),
                escape(&link.text)
            );
        }
        html.push_str("</ul>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}
