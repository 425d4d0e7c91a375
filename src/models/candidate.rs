use serde::{Deserialize, Serialize};

/// 选项标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChoiceLabel {
    A,
    B,
    C,
    D,
}

impl ChoiceLabel {
    pub const ALL: [ChoiceLabel; 4] = [ChoiceLabel::A, ChoiceLabel::B, ChoiceLabel::C, ChoiceLabel::D];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChoiceLabel::A => "A",
            ChoiceLabel::B => "B",
            ChoiceLabel::C => "C",
            ChoiceLabel::D => "D",
        }
    }

    /// 解析模型回复中的 "A" / "b" / "(C)" / "D)" / "Choice A" 等写法，也接受从 0 开始的下标
    pub fn parse(s: &str) -> Option<Self> {
        let cleaned = clean_label(s);
        Self::letter(&cleaned).or_else(|| cleaned.parse::<usize>().ok().and_then(Self::from_index))
    }

    /// 只接受字母写法（用户作答）
    pub fn parse_letter(s: &str) -> Option<Self> {
        Self::letter(&clean_label(s))
    }

    fn letter(cleaned: &str) -> Option<Self> {
        match cleaned.to_ascii_uppercase().as_str() {
            "A" => Some(ChoiceLabel::A),
            "B" => Some(ChoiceLabel::B),
            "C" => Some(ChoiceLabel::C),
            "D" => Some(ChoiceLabel::D),
            _ => None,
        }
    }
}

fn clean_label(s: &str) -> String {
    s.trim()
        .trim_start_matches("Choice")
        .trim_start_matches("choice")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

impl std::fmt::Display for ChoiceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 候选题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateItem {
    pub prompt: String,
    pub passage: Option<String>,
    pub choices: Vec<String>,
    pub correct_choice: ChoiceLabel,
    pub explanation: Option<String>,
    pub needs_visual: bool,
    pub visual_description: Option<String>,
}

impl CandidateItem {
    /// 检查结构约束，返回违反项（为空表示合法）
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.prompt.trim().is_empty() {
            violations.push("题干为空".to_string());
        }
        if self.choices.len() != 4 {
            violations.push(format!("选项数量必须为 4，实际为 {}", self.choices.len()));
        }
        if self.correct_choice.index() >= self.choices.len() {
            violations.push(format!("正确答案 {} 不对应任何选项", self.correct_choice));
        }
        if self.choices.iter().any(|c| c.trim().is_empty()) {
            violations.push("存在空选项".to_string());
        }
        let mut normalized: Vec<String> =
            self.choices.iter().map(|c| c.trim().to_lowercase()).collect();
        normalized.sort();
        normalized.dedup();
        if normalized.len() != self.choices.len() {
            violations.push("存在重复选项".to_string());
        }
        if self.needs_visual
            && self
                .visual_description
                .as_deref()
                .map_or(true, |d| d.trim().is_empty())
        {
            violations.push("需要配图但缺少配图描述".to_string());
        }

        violations
    }

    /// 正确选项文本
    pub fn correct_text(&self) -> Option<&str> {
        self.choices.get(self.correct_choice.index()).map(String::as_str)
    }

    /// 题干 + 文章，用于分类和信息抽取
    pub fn full_text(&self) -> String {
        match &self.passage {
            Some(passage) => format!("{}\n{}", passage, self.prompt),
            None => self.prompt.clone(),
        }
    }

    /// 渲染为审题用的纯文本
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(passage) = &self.passage {
            out.push_str("Passage:\n");
            out.push_str(passage);
            out.push_str("\n\n");
        }
        out.push_str("Question: ");
        out.push_str(&self.prompt);
        out.push('\n');
        for (label, choice) in ChoiceLabel::ALL.iter().zip(self.choices.iter()) {
            out.push_str(&format!("{}) {}\n", label, choice));
        }
        out.push_str(&format!("Marked correct answer: {}\n", self.correct_choice));
        if let Some(explanation) = &self.explanation {
            out.push_str("Explanation: ");
            out.push_str(explanation);
            out.push('\n');
        }
        if let Some(desc) = &self.visual_description {
            out.push_str("Visual description: ");
            out.push_str(desc);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// 一道合法的圆题，测试共用
    pub fn circle_item() -> CandidateItem {
        CandidateItem {
            prompt: "A circle has center O and radius 6 centimeters. Points A and B lie on the circle, and the central angle AOB measures 60°. What is the length of arc AB, in centimeters?".into(),
            passage: None,
            choices: vec!["π".into(), "2π".into(), "3π".into(), "6π".into()],
            correct_choice: ChoiceLabel::B,
            explanation: Some("The arc is 60/360 of the circumference. The circumference is 2π(6) = 12π, and 12π × 1/6 = 2π.".into()),
            needs_visual: true,
            visual_description: Some("Circle with center O, radius 6 cm drawn to points A and B, central angle AOB labeled 60°.".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::circle_item;
    use super::*;

    #[test]
    fn test_choice_label_parse() {
        assert_eq!(ChoiceLabel::parse("A"), Some(ChoiceLabel::A));
        assert_eq!(ChoiceLabel::parse("(c)"), Some(ChoiceLabel::C));
        assert_eq!(ChoiceLabel::parse("D)"), Some(ChoiceLabel::D));
        assert_eq!(ChoiceLabel::parse("Choice B"), Some(ChoiceLabel::B));
        assert_eq!(ChoiceLabel::parse("E"), None);
        assert_eq!(ChoiceLabel::parse("1"), Some(ChoiceLabel::B));
        assert_eq!(ChoiceLabel::parse("4"), None);
    }

    #[test]
    fn test_user_answers_are_letters_only() {
        assert_eq!(ChoiceLabel::parse_letter("(c)"), Some(ChoiceLabel::C));
        assert_eq!(ChoiceLabel::parse_letter("Choice D"), Some(ChoiceLabel::D));
        assert_eq!(ChoiceLabel::parse_letter("1"), None);
        assert_eq!(ChoiceLabel::parse_letter("0"), None);
    }

    #[test]
    fn test_valid_item_has_no_violations() {
        assert!(circle_item().check_invariants().is_empty());
    }

    #[test]
    fn test_visual_flag_requires_description() {
        let mut item = circle_item();
        item.visual_description = Some("   ".into());
        let violations = item.check_invariants();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("配图描述"));
    }

    #[test]
    fn test_three_choices_and_out_of_range_answer() {
        let mut item = circle_item();
        item.choices.truncate(3);
        item.correct_choice = ChoiceLabel::D;
        let violations = item.check_invariants();
        assert!(violations.iter().any(|v| v.contains("选项数量")));
        assert!(violations.iter().any(|v| v.contains("不对应任何选项")));
    }
}
