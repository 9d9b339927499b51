// All built-in prompt templates for the screening pipeline.
// Placeholders are `{name}`; see `template::render` for substitution rules.
// Files in PROMPTS_DIR with the names below override these at startup.

pub const QUESTIONS_PROMPT_FILE: &str = "generate_questions_prompt.txt";
pub const SCORING_PROMPT_FILE: &str = "score_answer_prompt.txt";

/// Question generation, free-text contract. Replace `{job_description}`, `{resume_text}`.
pub const QUESTIONS_TEXT_TEMPLATE: &str = r#"You are an experienced technical interviewer screening a candidate for the role below.

JOB DESCRIPTION:
{job_description}

CANDIDATE RESUME:
{resume_text}

Write exactly 3 interview questions that test whether this candidate meets the most important requirements of the role. Ground each question in something the resume claims.

Output format:
1. <first question>
2. <second question>
3. <third question>

Output ONLY the three numbered questions. No preamble, no commentary."#;

/// Answer scoring, free-text contract. Replace `{question}`, `{answer}`.
pub const SCORING_TEXT_TEMPLATE: &str = r#"You are grading a candidate's answer to an interview question.

QUESTION:
{question}

CANDIDATE ANSWER:
{answer}

Score the answer from 1 (poor) to 10 (excellent) for correctness, depth and relevance.

Reply on a single line in this format:
<score> - <one or two sentence explanation>

The score MUST be a whole number between 1 and 10."#;

/// Question generation, JSON contract. Replace `{job_description}`, `{resume_text}`.
pub const QUESTIONS_JSON_TEMPLATE: &str = r#"You are an experienced technical interviewer screening a candidate for the role below.

JOB DESCRIPTION:
{job_description}

CANDIDATE RESUME:
{resume_text}

Write exactly 3 interview questions that test whether this candidate meets the most important requirements of the role. Ground each question in something the resume claims.

Return a JSON object with this EXACT schema (no extra fields):
{"questions": ["first question", "second question", "third question"]}

You MUST respond with valid JSON only. Do NOT use markdown code fences."#;

/// Answer scoring, JSON contract. Replace `{question}`, `{answer}`.
pub const SCORING_JSON_TEMPLATE: &str = r#"You are grading a candidate's answer to an interview question.

QUESTION:
{question}

CANDIDATE ANSWER:
{answer}

Score the answer from 1 (poor) to 10 (excellent) for correctness, depth and relevance.

Return a JSON object with this EXACT schema (no extra fields):
{"score": 7, "explanation": "one or two sentences"}

"score" MUST be a whole number between 1 and 10.
You MUST respond with valid JSON only. Do NOT use markdown code fences."#;
