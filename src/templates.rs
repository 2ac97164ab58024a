//! Outreach templates — the 3-step cold email sequence.
//!
//! Content rules carried by every template: plain text, under ~125 words,
//! exactly one call to action, sent from a named person. Each step is
//! shorter and more direct than the one before it. Rendering is pure; an
//! unknown sequence position falls back to the opener rather than failing.

use crate::config::SenderIdentity;
use crate::model::Lead;

/// A rendered outreach email.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

/// Render the email for a sequence position. Numbers outside 1..=3 fall
/// back to template 1.
pub fn render(lead: &Lead, email_number: u8, sender: &SenderIdentity) -> RenderedEmail {
    match email_number {
        2 => render_value_note(lead, sender),
        3 => render_breakup(lead, sender),
        _ => render_opener(lead, sender),
    }
}

/// Email 1, day 0: problem, proof, one ask.
fn render_opener(lead: &Lead, sender: &SenderIdentity) -> RenderedEmail {
    let name = greeting_name(&lead.contact_name);
    let company = company_or_default(lead);
    let industry = industry_or_default(lead);
    let location = location_phrase(&lead.city, &lead.state);
    let where_clause = if location.is_empty() {
        "your area".to_string()
    } else {
        location
    };

    let opener = opening_line(lead, &company, &industry);

    let subject = format!("{company} - quick thought");
    let body = format!(
        "Hi {name},\n\
         \n\
         {opener}\n\
         \n\
         Right now, when someone in {where_clause} searches for a {industry} nearby, they're \
         finding your competitors first. That's real revenue slipping away every week.\n\
         \n\
         We recently took a small shop through the same fix: three weeks of work, and they're \
         now booking customers who simply couldn't find them before.\n\
         \n\
         Open to a quick 10-minute call so I can show you what we'd do for {company}? No \
         pitch, just an honest look at what you're missing.\n\
         \n\
         {sender_name}\n\
         {sender_company} | {phone} | {site}",
        sender_name = sender.name,
        sender_company = sender.company,
        phone = sender.phone,
        site = sender.website,
    );

    RenderedEmail { subject, body }
}

/// Email 2, day 3: shorter, concrete value, references email 1.
fn render_value_note(lead: &Lead, sender: &SenderIdentity) -> RenderedEmail {
    let name = greeting_name(&lead.contact_name);
    let company = company_or_default(lead);

    let subject = format!("re: {company} - quick thought");
    let body = format!(
        "Hi {name},\n\
         \n\
         Following up on my last note. I know you're busy running {company}, so I'll keep \
         this short.\n\
         \n\
         A quick look at how {company} shows up online today:\n\
         \n\
         - Without a site of your own, search engines can't send you customers\n\
         - Competitors with a real web presence rank ahead of you locally\n\
         - Word of mouth alone caps how fast you can grow\n\
         \n\
         We fix all three in about three weeks. Worth a 10-minute conversation?\n\
         \n\
         {first}\n\
         {phone} | {site}",
        first = sender.first_name(),
        phone = sender.phone,
        site = sender.website,
    );

    RenderedEmail { subject, body }
}

/// Email 3, day 7: the breakup. Shortest of the three.
fn render_breakup(lead: &Lead, sender: &SenderIdentity) -> RenderedEmail {
    let name = greeting_name(&lead.contact_name);
    let company = company_or_default(lead);

    let subject = "closing the loop".to_string();
    let body = format!(
        "Hi {name},\n\
         \n\
         I've reached out a couple of times about helping {company} get found online. I \
         don't want to be a pest, so this is my last note.\n\
         \n\
         If more customers from search sounds worth exploring, just reply here or call me \
         at {phone}.\n\
         \n\
         Either way, wishing you the best with {company}.\n\
         \n\
         {first}\n\
         {phone} | {site}",
        first = sender.first_name(),
        phone = sender.phone,
        site = sender.website,
    );

    RenderedEmail { subject, body }
}

/// First line of email 1, picked by what we actually know: the scoring
/// insight's first sentence, a location reference, or a generic opener.
fn opening_line(lead: &Lead, company: &str, industry: &str) -> String {
    if let Some(sentence) = first_sentence(&lead.insight) {
        return sentence;
    }
    if !lead.city.is_empty() {
        return format!(
            "I was looking at {industry} businesses in {city} and came across {company}.",
            city = lead.city,
        );
    }
    format!("I came across {company} and had a quick thought.")
}

/// Greeting name: first token of the contact name, with placeholder-like
/// values normalized to a generic greeting.
fn greeting_name(contact_name: &str) -> String {
    let first = contact_name.split_whitespace().next().unwrap_or("");
    match first.to_lowercase().as_str() {
        "" | "owner" | "manager" | "unknown" => "there".to_string(),
        _ => first.to_string(),
    }
}

fn company_or_default(lead: &Lead) -> String {
    if lead.company_name.is_empty() {
        "your business".to_string()
    } else {
        lead.company_name.clone()
    }
}

fn industry_or_default(lead: &Lead) -> String {
    if lead.industry.is_empty() {
        "business".to_string()
    } else {
        lead.industry.clone()
    }
}

/// "City, ST", or whichever half exists, or empty.
fn location_phrase(city: &str, state: &str) -> String {
    match (city.is_empty(), state.is_empty()) {
        (false, false) => format!("{city}, {state}"),
        (false, true) => city.to_string(),
        (true, false) => state.to_string(),
        (true, true) => String::new(),
    }
}

/// First sentence of a narrative, period included. `None` for empty input.
fn first_sentence(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.split_once('.') {
        Some((head, _)) => Some(format!("{}.", head.trim_end())),
        None => Some(trimmed.to_string()),
    }
}

/// Convert a plain-text body to minimal HTML: one paragraph per line, a
/// break for each blank line. Deliberately looks like a hand-written email.
pub fn to_html(body: &str) -> String {
    let lines: Vec<String> = body
        .trim()
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                "<br>".to_string()
            } else {
                format!(
                    "<p style='margin:0 0 2px 0;color:#1a1a1a;font-family:Arial,sans-serif;\
                     font-size:14px;line-height:1.5;'>{line}</p>"
                )
            }
        })
        .collect();
    format!("<div style='max-width:600px;'>{}</div>", lines.join("\n"))
}
