//! Prompt templates for planning, distillation, reporting and entity research

use chrono::Utc;

/// Prompt templates used by the research components
pub struct ResearchPrompts;

impl ResearchPrompts {
    /// Get the current date formatted for prompts
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// System preamble shared by every extraction call
    pub fn system() -> String {
        format!(
            r#"You are an expert researcher. Today is {date}. Follow these instructions when responding:
- You may be asked to research subjects that are after your knowledge cutoff; assume the user is right when presented with news.
- The user is a highly experienced analyst, no need to simplify it, be as detailed as possible and make sure your response is correct.
- Be highly organized.
- Suggest solutions that the user did not think about.
- Be proactive and anticipate the user's needs.
- Mistakes erode trust, so be accurate and thorough.
- Provide detailed explanations, the user is comfortable with lots of detail.
- Value good arguments over authorities, the source is irrelevant.
- Consider new technologies and contrarian ideas, not just the conventional wisdom.
- You may use high levels of speculation or prediction, just flag it for the user.
- Always answer with a single JSON object and nothing else."#,
            date = Self::current_date()
        )
    }

    /// Query generation for one exploration level
    pub fn plan_queries(topic: &str, max_queries: usize, learnings: &[String]) -> String {
        let mut prompt = format!(
            "Given the following prompt from the user, generate a list of SERP queries to research the topic. \
             Return a maximum of {max_queries} queries, but feel free to return less if the original prompt is clear. \
             Make sure each query is unique and not similar to each other: <prompt>{topic}</prompt>"
        );
        if !learnings.is_empty() {
            prompt.push_str(&format!(
                "\n\nHere are some learnings from previous research, use them to generate more specific queries: {}",
                learnings.join("\n")
            ));
        }
        prompt
    }

    /// Query generation for entity discovery
    pub fn plan_discovery(topic: &str, max_queries: usize) -> String {
        format!(
            "Generate up to {max_queries} distinct search queries whose results are likely to name the individual \
             entities (products, compounds, programs, organizations) relevant to this topic. Prefer queries that \
             surface lists, pipelines, registries and overviews: <topic>{topic}</topic>"
        )
    }

    /// Learning and follow-up extraction for one query's results
    pub fn distill(
        query: &str,
        contents: &[String],
        max_learnings: usize,
        max_follow_ups: usize,
    ) -> String {
        let contents = contents
            .iter()
            .map(|content| format!("<content>\n{content}\n</content>"))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Given the following contents from a SERP search for the query <query>{query}</query>, generate a list of \
             learnings from the contents. Return a maximum of {max_learnings} learnings, but feel free to return less \
             if the contents are clear. Make sure each learning is unique and not similar to each other. The learnings \
             should be concise and to the point, as detailed and information dense as possible. Make sure to include \
             any entities like people, places, companies, products, things, etc in the learnings, as well as any exact \
             metrics, numbers, or dates. The learnings will be used to research the topic further. Also return up to \
             {max_follow_ups} follow-up questions to research the topic further.\n\n<contents>{contents}</contents>"
        )
    }

    /// Long-form report from all learnings
    pub fn final_report(prompt: &str, learnings: &[String]) -> String {
        format!(
            "Given the following prompt from the user, write a final report on the topic using the learnings from \
             research. Make it as detailed as possible, aim for 3 or more pages, include ALL the learnings from \
             research:\n\n<prompt>{prompt}</prompt>\n\nHere are all the learnings from previous research:\n\n\
             <learnings>\n{}\n</learnings>",
            Self::tagged_learnings(learnings)
        )
    }

    /// Short answer from all learnings
    pub fn final_answer(prompt: &str, learnings: &[String]) -> String {
        format!(
            "Given the following prompt from the user, write a final answer on the topic using the learnings from \
             research. Follow the format specified in the prompt. Do not yap or babble or include any other text than \
             the answer besides the format specified in the prompt. Keep the answer as concise as possible - usually \
             it should be just a few words or maximum a sentence.\n\n<prompt>{prompt}</prompt>\n\nHere are all the \
             learnings from research on the topic that you can use to help answer the prompt:\n\n<learnings>\n{}\n</learnings>",
            Self::tagged_learnings(learnings)
        )
    }

    /// Named-entity extraction from one discovery result
    pub fn extract_entities(topic: &str, content: &str) -> String {
        format!(
            "List every distinct named entity relevant to <topic>{topic}</topic> that appears in the \
             content below. Use the name exactly as written in the source. Do not invent \
             entities.\n\n<content>\n{content}\n</content>"
        )
    }

    /// Record fragment extraction from one document
    pub fn extract_record(entity: &str, url: Option<&str>, content: &str) -> String {
        format!(
            "Extract everything the document states about <entity>{entity}</entity>. Use \"unknown\" for any field the \
             document does not support. Dated developments go into events; cite the document URL as each event's \
             source.\n\n<source>{}</source>\n<content>\n{content}\n</content>",
            url.unwrap_or("unknown")
        )
    }

    /// Reconciliation of record fragments into one canonical record
    pub fn merge_records(entity: &str, fragments_json: &str) -> String {
        format!(
            "The following partial records about <entity>{entity}</entity> were extracted from different sources. \
             Merge them into one canonical record. When fields conflict prefer the most specific and most recent \
             information. Keep every distinct dated event and every reference URL.\n\n<fragments>\n{fragments_json}\n</fragments>"
        )
    }

    fn tagged_learnings(learnings: &[String]) -> String {
        learnings
            .iter()
            .map(|learning| format!("<learning>\n{learning}\n</learning>"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
