//! Built-in oracle prompts.

/// Default normalization prompt. `{url}`, `{content}`, `{links}`, and
/// `{images}` are replaced before sending.
pub const DEFAULT_NORMALIZE_PROMPT: &str = r#"You are normalizing a harvested web page into a structured project listing.

Source URL: {url}

Page text:
{content}

Links found on the page:
{links}

Images found on the page:
{images}

Respond with a single JSON object and nothing else, using exactly these fields:
- "title": short project title
- "summary": one-sentence summary
- "description": two to four paragraphs of plain-text description
- "source_url": the canonical URL for this project; use the page's own URL if nothing better appears on the page
- "contact_email": a contact address shown on the page, or null
- "links": up to 5 of the most relevant links from the list above
- "image_url": the single best image URL for the project, or null
- "payload_assessment": an object with "status" ("ok" or "too_thin") and "reason" (short explanation)

Set payload_assessment.status to "too_thin" when the page text is navigation,
cookie banners, boilerplate, or an error page rather than real project content.
Use only facts that appear on the page. Do not invent anything.
"#;
