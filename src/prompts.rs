/// Self-introduction seeded into the first configuration record.
pub const DEFAULT_INTRODUCE_TEXT: &str = "I am a third-year economics student with a solid grounding in economic theory and data analysis, and a strong interest in AI products and the internet industry. I am looking for an internship where I can combine economics with hands-on product work. My strengths: 1) market analysis and insight into user needs, backed by clear logical thinking; 2) working knowledge of Python and data processing for everyday analysis; 3) I learn quickly and keep up with new technology and product trends; 4) good communication skills and a collaborative attitude.";

/// Greeting template seeded into the first configuration record.
///
/// Placeholders, in order: introduction, keywords, job title, job
/// description, reference greeting.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r####"Based on the information below, write a short, friendly greeting to a recruiter that shows how well the candidate fits the company and the role, and that the interest is sincere:
Introduction: %s
Keywords: %s
Job title: %s
Job description: %s
Reference greeting: %s

Requirements: 1) open by stating interest in the role and appreciation for the company; 2) connect the economics background with the product, emphasising data analysis and insight into user needs; 3) say why this company, based on what it does; 4) highlight fast learning and teamwork; 5) show an understanding of the industry and the company culture; 6) avoid cliches and keep it natural; 7) stay under 250 words."####;

/// Positional placeholder used by prompt templates.
pub const TEMPLATE_PLACEHOLDER: &str = "%s";
