/// Few-shot prompt formats for grouped (input, output) example arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStyle {
    /// `Q: {input} A: {output}` pairs on one line.
    #[default]
    Short,
    /// `Question:` / `Answer:` blocks.
    Long,
    /// `{input} => {output}` lines.
    Arrow,
}

impl QueryStyle {
    fn header(&self) -> &'static str {
        match self {
            QueryStyle::Short => "Transformations: ",
            QueryStyle::Long | QueryStyle::Arrow => "Transformations:\n\n",
        }
    }

    fn separator(&self) -> &'static str {
        match self {
            QueryStyle::Short => " ",
            QueryStyle::Long => "\n\n",
            QueryStyle::Arrow => "\n",
        }
    }

    fn pair(&self, input: &str, output: &str) -> String {
        match self {
            QueryStyle::Short => format!("Q: {input} A: {output}"),
            QueryStyle::Long => format!("Question: {input}\nAnswer: {output}"),
            QueryStyle::Arrow => format!("{input} => {output}"),
        }
    }

    /// Render the grouped examples followed by `question` with an empty
    /// output slot for the model to fill.
    pub fn render(&self, background: &[(String, String)], question: &str) -> String {
        let mut blocks: Vec<String> = background
            .iter()
            .map(|(input, output)| self.pair(input, output))
            .collect();
        blocks.push(self.pair(question, ""));
        format!("{}{}", self.header(), blocks.join(self.separator()))
            .trim_end()
            .to_string()
    }
}

/// Whether every example output is a substring of its input. Constrained
/// queries only accept completions that occur in the question.
pub fn constrain_output(background: &[(String, String)]) -> bool {
    background
        .iter()
        .all(|(input, output)| input.contains(output.as_str()))
}

/// Select the completion to return: the first one when unconstrained, else
/// the first that occurs in the question case-insensitively.
pub fn pick_completion(completions: &[String], question: &str, constrained: bool) -> String {
    if !constrained {
        return completions
            .first()
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
    }
    let question_lower = question.to_lowercase();
    completions
        .iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty() && question_lower.contains(&c.to_lowercase()))
        .map(str::to_string)
        .unwrap_or_default()
}
