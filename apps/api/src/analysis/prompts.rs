// Prompt constants for CV analysis.

use crate::analysis::record::JobContext;

/// Shape the AI must answer with. Scores are 0–100.
pub const AI_RESPONSE_FORMAT: &str = r#"interface Feedback {
  overallScore: number; //max 100
  ATS: {
    score: number; //rate based on ATS suitability
    tips: {
      type: "good" | "improve";
      tip: string; //give 3-4 tips
    }[];
  };
  toneAndStyle: {
    score: number; //max 100
    tips: {
      type: "good" | "improve";
      tip: string; //make it a short "title" for the actual explanation
      explanation: string; //explain in detail here
    }[]; //give 3-4 tips
  };
  content: {
    score: number; //max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
  structure: {
    score: number; //max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
  skills: {
    score: number; //max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
}"#;

/// Analysis prompt template. Replace `{company_name}`, `{job_title}`,
/// `{job_description}` and `{response_format}` before sending.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"You are an expert in ATS (Applicant Tracking System) and CV analysis.
Please analyze and rate this CV and suggest how to improve it.
The rating can be low if the CV is bad.
Be thorough and detailed. Don't be afraid to point out any mistakes or areas for improvement.
If there is a lot to improve, don't hesitate to give low scores. This is to help the user improve their CV.
If available, use the job description for the job the user is applying to, to give more detailed feedback.
If provided, take the job description into consideration.
The company name is: {company_name}
The job title is: {job_title}
The job description is: {job_description}
Provide the feedback using the following format:
{response_format}
Return the analysis as a JSON object, without any other text and without the backticks.
Do not include any other text or comments."#;

/// Builds the instructions sent with the CV preview.
pub fn prepare_instructions(job: &JobContext) -> String {
    fill_template(
        ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("company_name", or_unspecified(&job.company_name)),
            ("job_title", or_unspecified(&job.job_title)),
            ("job_description", or_unspecified(&job.job_description)),
            ("response_format", AI_RESPONSE_FORMAT),
        ],
    )
}

/// Substitutes `{name}` placeholders in one left-to-right pass. Substituted
/// text is never rescanned, so braces in user input come through verbatim.
/// Unknown placeholders are left as they are.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substitution = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, &after[close + 1..]))
        });
        match substitution {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn or_unspecified(text: &str) -> &str {
    let text = text.trim();
    if text.is_empty() {
        "not specified"
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_instructions_fills_every_placeholder() {
        let prompt = prepare_instructions(&JobContext {
            company_name: "Acme".into(),
            job_title: "Backend Engineer".into(),
            job_description: "Rust, Postgres".into(),
        });
        assert!(prompt.contains("The company name is: Acme"));
        assert!(prompt.contains("The job title is: Backend Engineer"));
        assert!(prompt.contains("The job description is: Rust, Postgres"));
        assert!(prompt.contains("overallScore: number"));
        assert!(!prompt.contains("{job_title}"));
        assert!(!prompt.contains("{response_format}"));
    }

    #[test]
    fn test_placeholders_in_user_text_are_not_expanded() {
        let prompt = prepare_instructions(&JobContext {
            company_name: "Acme {job_description}".into(),
            job_title: "Dev {response_format}".into(),
            job_description: "SECRET-JD {company_name} {job_title}".into(),
        });
        assert!(prompt.contains("The company name is: Acme {job_description}\n"));
        assert!(prompt.contains("The job title is: Dev {response_format}\n"));
        assert!(prompt.contains("The job description is: SECRET-JD {company_name} {job_title}\n"));
        assert_eq!(prompt.matches("SECRET-JD").count(), 1);
        assert_eq!(prompt.matches("interface Feedback").count(), 1);
    }

    #[test]
    fn test_fill_template_keeps_unknown_and_unclosed_braces() {
        let filled = fill_template("{a} {b} {a", &[("a", "1")]);
        assert_eq!(filled, "1 {b} {a");
    }

    #[test]
    fn test_blank_context_is_marked_unspecified() {
        let prompt = prepare_instructions(&JobContext::default());
        assert!(prompt.contains("The job title is: not specified"));
    }
}
