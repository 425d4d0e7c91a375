//! 题型分类表
//!
//! SAT 的两个部分各有四个内容领域（topic），每个领域下有若干技能点（subtopic）。
//! 每个技能点都带有自己独有的词汇表，出题规划和题型识别都依赖这张表。

use phf::phf_map;
use serde::{Deserialize, Serialize};

use crate::models::request::Section;

/// 内容领域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    // 阅读与写作
    InformationAndIdeas,
    CraftAndStructure,
    ExpressionOfIdeas,
    StandardEnglishConventions,
    // 数学
    Algebra,
    AdvancedMath,
    ProblemSolvingAndDataAnalysis,
    GeometryAndTrigonometry,
}

/// 别名表：slug、展示名、常见缩写都可以解析
static TOPIC_ALIASES: phf::Map<&'static str, Topic> = phf_map! {
    "information-and-ideas" => Topic::InformationAndIdeas,
    "information and ideas" => Topic::InformationAndIdeas,
    "craft-and-structure" => Topic::CraftAndStructure,
    "craft and structure" => Topic::CraftAndStructure,
    "expression-of-ideas" => Topic::ExpressionOfIdeas,
    "expression of ideas" => Topic::ExpressionOfIdeas,
    "standard-english-conventions" => Topic::StandardEnglishConventions,
    "standard english conventions" => Topic::StandardEnglishConventions,
    "sec" => Topic::StandardEnglishConventions,
    "algebra" => Topic::Algebra,
    "advanced-math" => Topic::AdvancedMath,
    "advanced math" => Topic::AdvancedMath,
    "problem-solving-and-data-analysis" => Topic::ProblemSolvingAndDataAnalysis,
    "problem solving and data analysis" => Topic::ProblemSolvingAndDataAnalysis,
    "psda" => Topic::ProblemSolvingAndDataAnalysis,
    "geometry-and-trigonometry" => Topic::GeometryAndTrigonometry,
    "geometry and trigonometry" => Topic::GeometryAndTrigonometry,
    "geometry" => Topic::GeometryAndTrigonometry,
};

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::InformationAndIdeas,
        Topic::CraftAndStructure,
        Topic::ExpressionOfIdeas,
        Topic::StandardEnglishConventions,
        Topic::Algebra,
        Topic::AdvancedMath,
        Topic::ProblemSolvingAndDataAnalysis,
        Topic::GeometryAndTrigonometry,
    ];

    /// 展示名
    pub fn name(self) -> &'static str {
        match self {
            Topic::InformationAndIdeas => "Information and Ideas",
            Topic::CraftAndStructure => "Craft and Structure",
            Topic::ExpressionOfIdeas => "Expression of Ideas",
            Topic::StandardEnglishConventions => "Standard English Conventions",
            Topic::Algebra => "Algebra",
            Topic::AdvancedMath => "Advanced Math",
            Topic::ProblemSolvingAndDataAnalysis => "Problem-Solving and Data Analysis",
            Topic::GeometryAndTrigonometry => "Geometry and Trigonometry",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Topic::InformationAndIdeas => "information-and-ideas",
            Topic::CraftAndStructure => "craft-and-structure",
            Topic::ExpressionOfIdeas => "expression-of-ideas",
            Topic::StandardEnglishConventions => "standard-english-conventions",
            Topic::Algebra => "algebra",
            Topic::AdvancedMath => "advanced-math",
            Topic::ProblemSolvingAndDataAnalysis => "problem-solving-and-data-analysis",
            Topic::GeometryAndTrigonometry => "geometry-and-trigonometry",
        }
    }

    pub fn section(self) -> Section {
        match self {
            Topic::InformationAndIdeas
            | Topic::CraftAndStructure
            | Topic::ExpressionOfIdeas
            | Topic::StandardEnglishConventions => Section::ReadingWriting,
            Topic::Algebra
            | Topic::AdvancedMath
            | Topic::ProblemSolvingAndDataAnalysis
            | Topic::GeometryAndTrigonometry => Section::Math,
        }
    }

    /// 解析主题（大小写不敏感，支持 slug 和展示名）
    pub fn resolve(s: &str) -> Option<Self> {
        let key = s.trim().to_lowercase().replace('_', "-");
        TOPIC_ALIASES.get(key.as_str()).copied()
    }

    /// 某个部分下的全部主题
    pub fn in_section(section: Section) -> impl Iterator<Item = Topic> {
        Self::ALL.into_iter().filter(move |t| t.section() == section)
    }

    /// 该主题下的全部技能点
    pub fn leaves(self) -> impl Iterator<Item = &'static SubtopicLeaf> {
        LEAVES.iter().filter(move |leaf| leaf.topic == self)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 技能点（分类表的叶子）
#[derive(Debug)]
pub struct SubtopicLeaf {
    pub topic: Topic,
    pub name: &'static str,
    /// 规范题型标签
    pub question_type: &'static str,
    /// 该技能点的特征词汇
    pub keywords: &'static [&'static str],
    /// 容易混淆的相邻技能点词汇，出题时必须避开
    pub avoid: &'static [&'static str],
    /// 规范问法
    pub canonical_phrasing: &'static str,
    /// 文章 / 题干约束
    pub passage_constraints: &'static str,
    /// 选项风格
    pub choice_style: &'static str,
}

impl SubtopicLeaf {
    /// 名称是否匹配（忽略大小写，允许部分匹配）
    pub fn matches_name(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        let own = self.name.to_lowercase();
        !wanted.is_empty() && (own == wanted || own.contains(&wanted) || wanted.contains(&own))
    }
}

/// 查找技能点
pub fn find_leaf(topic: Topic, subtopic: &str) -> Option<&'static SubtopicLeaf> {
    let wanted = subtopic.trim().to_lowercase();
    topic
        .leaves()
        .find(|leaf| leaf.name.to_lowercase() == wanted)
        .or_else(|| topic.leaves().find(|leaf| leaf.matches_name(subtopic)))
}

/// 出题规划（由 topic + subtopic 确定性生成，不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPlan {
    pub topic: Topic,
    pub subtopic: Option<String>,
    pub question_type: String,
    pub required_keywords: Vec<String>,
    pub forbidden_keywords: Vec<String>,
    pub canonical_phrasing: String,
    pub passage_constraints: String,
    pub choice_style: String,
    pub alignment_statement: String,
}

pub static LEAVES: &[SubtopicLeaf] = &[
    // ---------- Information and Ideas ----------
    SubtopicLeaf {
        topic: Topic::InformationAndIdeas,
        name: "Central Ideas and Details",
        question_type: "central-idea",
        keywords: &["main idea", "central idea", "best states", "mainly", "primarily about", "according to the text", "detail"],
        avoid: &["notes", "student wants to", "text 1", "text 2", "underlined"],
        canonical_phrasing: "Which choice best states the main idea of the text?",
        passage_constraints: "One passage of 25-150 words (literary or informational) whose central idea can be paraphrased in one sentence.",
        choice_style: "Four one-sentence paraphrases; distractors are too narrow, too broad, or unsupported by the passage.",
    },
    SubtopicLeaf {
        topic: Topic::InformationAndIdeas,
        name: "Command of Evidence (Textual)",
        question_type: "textual-evidence",
        keywords: &["most directly support", "support the claim", "claim", "evidence", "finding", "quotation", "illustrate", "hypothesis"],
        avoid: &["table", "graph", "notes", "student wants to"],
        canonical_phrasing: "Which finding, if true, would most directly support the researcher's claim?",
        passage_constraints: "One passage of 25-150 words that states a claim or hypothesis explicitly.",
        choice_style: "Four findings or quotations; exactly one directly supports the claim.",
    },
    SubtopicLeaf {
        topic: Topic::InformationAndIdeas,
        name: "Command of Evidence (Quantitative)",
        question_type: "quantitative-evidence",
        keywords: &["table", "graph", "data", "chart", "figure", "according to the table", "data from the"],
        avoid: &["notes", "student wants to", "main idea"],
        canonical_phrasing: "Which choice most effectively uses data from the table to complete the statement?",
        passage_constraints: "A short passage paired with a table or graph; the correct choice must be checkable against the data.",
        choice_style: "Four data-based statements; distractors misread the data or are true but irrelevant.",
    },
    SubtopicLeaf {
        topic: Topic::InformationAndIdeas,
        name: "Inferences",
        question_type: "inference",
        keywords: &["most logically completes", "logically completes", "infer", "suggests", "implies", "______"],
        avoid: &["transition", "notes", "precise word"],
        canonical_phrasing: "Which choice most logically completes the text?",
        passage_constraints: "One passage of 25-150 words ending in a blank that requires a reasoned inference.",
        choice_style: "Four clause-length completions; only one follows logically from the passage.",
    },
    // ---------- Craft and Structure ----------
    SubtopicLeaf {
        topic: Topic::CraftAndStructure,
        name: "Words in Context",
        question_type: "words-in-context",
        keywords: &["most logical and precise word", "precise word", "word or phrase", "as used in the text", "most nearly mean"],
        avoid: &["transition", "notes", "main idea"],
        canonical_phrasing: "Which choice completes the text with the most logical and precise word or phrase?",
        passage_constraints: "One passage of 25-150 words with a single blank or an underlined word.",
        choice_style: "Four single words or short phrases of the same part of speech.",
    },
    SubtopicLeaf {
        topic: Topic::CraftAndStructure,
        name: "Text Structure and Purpose",
        question_type: "text-structure",
        keywords: &["main purpose", "overall structure", "function of the underlined", "underlined sentence", "serves to", "structure of the text"],
        avoid: &["text 2", "notes", "main idea"],
        canonical_phrasing: "Which choice best describes the function of the underlined sentence in the text as a whole?",
        passage_constraints: "One passage of 25-150 words; may contain one underlined sentence.",
        choice_style: "Four descriptions of rhetorical function or structure, phrased with verbs like 'introduces', 'contrasts'.",
    },
    SubtopicLeaf {
        topic: Topic::CraftAndStructure,
        name: "Cross-Text Connections",
        question_type: "cross-text",
        keywords: &["text 1", "text 2", "both texts", "most likely respond", "author of text 2", "author of text 1"],
        avoid: &["notes", "student wants to", "table"],
        canonical_phrasing: "Based on the texts, how would the author of Text 2 most likely respond to the claim in Text 1?",
        passage_constraints: "Two labeled passages, 'Text 1' and 'Text 2', on the same subject with differing views.",
        choice_style: "Four predicted responses; distractors misattribute a view to the wrong text.",
    },
    // ---------- Expression of Ideas ----------
    SubtopicLeaf {
        topic: Topic::ExpressionOfIdeas,
        name: "Rhetorical Synthesis",
        question_type: "rhetorical-synthesis",
        keywords: &["notes", "student wants to", "while researching", "relevant information from the notes", "accomplish this goal", "emphasize", "combine"],
        avoid: &["main idea", "best states", "summarize", "text 1", "text 2"],
        canonical_phrasing: "The student wants to emphasize a similarity between the two studies. Which choice most effectively uses relevant information from the notes to accomplish this goal?",
        passage_constraints: "A bulleted list of 4-6 research notes introduced by 'While researching a topic, a student has taken the following notes:'.",
        choice_style: "Four full sentences that each combine facts from the notes; only one meets the stated goal.",
    },
    SubtopicLeaf {
        topic: Topic::ExpressionOfIdeas,
        name: "Transitions",
        question_type: "transition",
        keywords: &["transition", "most logical transition", "however", "therefore", "moreover", "in addition", "consequently", "for example"],
        avoid: &["notes", "precise word", "conventions of standard english"],
        canonical_phrasing: "Which choice completes the text with the most logical transition?",
        passage_constraints: "One passage of 25-150 words with a blank at the start of a sentence.",
        choice_style: "Four transition words or phrases signalling different logical relationships.",
    },
    // ---------- Standard English Conventions ----------
    SubtopicLeaf {
        topic: Topic::StandardEnglishConventions,
        name: "Boundaries",
        question_type: "boundaries",
        keywords: &["conforms to the conventions of standard english", "punctuation", "comma", "semicolon", "colon", "dash", "sentence boundary"],
        avoid: &["notes", "transition", "precise word"],
        canonical_phrasing: "Which choice completes the text so that it conforms to the conventions of Standard English?",
        passage_constraints: "One passage of 25-150 words with a blank at a clause or sentence boundary.",
        choice_style: "Four versions of the same words that differ only in punctuation.",
    },
    SubtopicLeaf {
        topic: Topic::StandardEnglishConventions,
        name: "Form, Structure, and Sense",
        question_type: "form-structure-sense",
        keywords: &["conforms to the conventions of standard english", "verb", "tense", "agreement", "pronoun", "plural", "possessive", "modifier"],
        avoid: &["notes", "transition", "semicolon"],
        canonical_phrasing: "Which choice completes the text so that it conforms to the conventions of Standard English?",
        passage_constraints: "One passage of 25-150 words with a blank testing verb form, agreement, pronoun, or modifier placement.",
        choice_style: "Four grammatical variants of the same word or phrase.",
    },
    // ---------- Algebra ----------
    SubtopicLeaf {
        topic: Topic::Algebra,
        name: "Linear equations in one variable",
        question_type: "linear-equation-one-variable",
        keywords: &["value of x", "solution to the equation", "linear equation", "solve for", "one variable"],
        avoid: &["x^2", "system", "inequality"],
        canonical_phrasing: "What value of x is the solution to the given equation?",
        passage_constraints: "A single linear equation or a short context that leads to one.",
        choice_style: "Four numeric values; distractors follow from common sign or distribution errors.",
    },
    SubtopicLeaf {
        topic: Topic::Algebra,
        name: "Linear functions",
        question_type: "linear-function",
        keywords: &["linear function", "f(x)", "slope", "y-intercept", "rate of change", "defined by"],
        avoid: &["x^2", "exponential", "system"],
        canonical_phrasing: "The function f is defined by f(x) = mx + b. What is the value of f(k)?",
        passage_constraints: "A linear function given by a formula, table, or context.",
        choice_style: "Four numeric values or four linear expressions.",
    },
    SubtopicLeaf {
        topic: Topic::Algebra,
        name: "Linear equations in two variables",
        question_type: "linear-equation-two-variables",
        keywords: &["two variables", "x and y", "ordered pair", "xy-plane", "line", "slope"],
        avoid: &["system", "x^2", "inequality"],
        canonical_phrasing: "Which equation represents the line in the xy-plane that passes through the given points?",
        passage_constraints: "A single equation in x and y or a context describing a linear relationship between two quantities.",
        choice_style: "Four equations or four ordered pairs.",
    },
    SubtopicLeaf {
        topic: Topic::Algebra,
        name: "Systems of two linear equations in two variables",
        question_type: "linear-system",
        keywords: &["system of equations", "system", "solution (x, y)", "intersect", "no solution", "infinitely many solutions"],
        avoid: &["x^2", "inequality", "exponential"],
        canonical_phrasing: "If (x, y) is the solution to the system of equations, what is the value of x + y?",
        passage_constraints: "Two linear equations in x and y, or a context that produces them.",
        choice_style: "Four numeric values or four ordered pairs.",
    },
    SubtopicLeaf {
        topic: Topic::Algebra,
        name: "Linear inequalities in one or two variables",
        question_type: "linear-inequality",
        keywords: &["inequality", "at least", "at most", "greater than", "less than", "≤", "≥", "maximum number"],
        avoid: &["x^2", "system of equations", "exponential"],
        canonical_phrasing: "Which inequality represents this situation?",
        passage_constraints: "A context with a constraint such as a budget or a capacity.",
        choice_style: "Four inequalities differing in direction or coefficients.",
    },
    // ---------- Advanced Math ----------
    SubtopicLeaf {
        topic: Topic::AdvancedMath,
        name: "Nonlinear functions",
        question_type: "nonlinear-function",
        keywords: &["exponential", "quadratic function", "vertex", "parabola", "growth", "decay", "minimum value", "maximum value"],
        avoid: &["slope", "system of equations", "inequality"],
        canonical_phrasing: "The function f is defined by f(x) = a(b)^x. Which of the following is true about f?",
        passage_constraints: "A quadratic, exponential, or polynomial function given by formula, graph, or context.",
        choice_style: "Four numeric values or four statements about the function.",
    },
    SubtopicLeaf {
        topic: Topic::AdvancedMath,
        name: "Nonlinear equations in one variable and systems of equations in two variables",
        question_type: "nonlinear-equation",
        keywords: &["quadratic equation", "x^2", "x²", "solutions", "discriminant", "roots", "zeros", "real solutions"],
        avoid: &["slope", "inequality", "percent"],
        canonical_phrasing: "What is the positive solution to the given equation?",
        passage_constraints: "A quadratic, radical, rational, or absolute value equation, or a linear-quadratic system.",
        choice_style: "Four numeric values; distractors come from sign errors or extraneous solutions.",
    },
    SubtopicLeaf {
        topic: Topic::AdvancedMath,
        name: "Equivalent expressions",
        question_type: "equivalent-expression",
        keywords: &["equivalent", "expression", "factor", "expand", "simplify", "rewrite", "equivalent to"],
        avoid: &["slope", "probability", "inequality"],
        canonical_phrasing: "Which expression is equivalent to the given expression?",
        passage_constraints: "A polynomial, rational, or exponential expression.",
        choice_style: "Four algebraic expressions.",
    },
    // ---------- Problem-Solving and Data Analysis ----------
    SubtopicLeaf {
        topic: Topic::ProblemSolvingAndDataAnalysis,
        name: "Ratios, rates, proportional relationships, and units",
        question_type: "ratio-rate",
        keywords: &["ratio", "rate", "proportional", "per", "units", "miles per hour", "convert"],
        avoid: &["probability", "margin of error", "scatterplot"],
        canonical_phrasing: "At this rate, how many units will be produced in the given time?",
        passage_constraints: "A real-world context with a rate, ratio, or unit conversion.",
        choice_style: "Four numeric values with consistent units.",
    },
    SubtopicLeaf {
        topic: Topic::ProblemSolvingAndDataAnalysis,
        name: "Percentages",
        question_type: "percentage",
        keywords: &["percent", "%", "increase by", "decrease by", "discount", "percentage"],
        avoid: &["probability", "scatterplot", "margin of error"],
        canonical_phrasing: "The price was increased by p percent. What is the new price?",
        passage_constraints: "A context involving percent of a quantity or percent change.",
        choice_style: "Four numeric values; distractors confuse percent of and percent change.",
    },
    SubtopicLeaf {
        topic: Topic::ProblemSolvingAndDataAnalysis,
        name: "One-variable data: distributions and measures of center and spread",
        question_type: "one-variable-data",
        keywords: &["mean", "median", "mode", "range", "standard deviation", "data set", "distribution", "average"],
        avoid: &["scatterplot", "probability", "line of best fit"],
        canonical_phrasing: "What is the median of the data set?",
        passage_constraints: "A list, dot plot, histogram, or frequency table of one variable.",
        choice_style: "Four numeric values or four comparison statements.",
    },
    SubtopicLeaf {
        topic: Topic::ProblemSolvingAndDataAnalysis,
        name: "Two-variable data: models and scatterplots",
        question_type: "two-variable-data",
        keywords: &["scatterplot", "line of best fit", "linear model", "predicted", "trend", "exponential model"],
        avoid: &["median", "probability", "margin of error"],
        canonical_phrasing: "Based on the line of best fit, what is the predicted value when x = k?",
        passage_constraints: "A scatterplot or table of paired data with a model.",
        choice_style: "Four predictions or four model equations.",
    },
    SubtopicLeaf {
        topic: Topic::ProblemSolvingAndDataAnalysis,
        name: "Probability and conditional probability",
        question_type: "probability",
        keywords: &["probability", "chance", "selected at random", "conditional", "given that", "two-way table"],
        avoid: &["margin of error", "scatterplot", "percent increase"],
        canonical_phrasing: "If one person is selected at random, what is the probability that the person is in group A?",
        passage_constraints: "A two-way table or a described sample space.",
        choice_style: "Four fractions or decimals between 0 and 1.",
    },
    SubtopicLeaf {
        topic: Topic::ProblemSolvingAndDataAnalysis,
        name: "Inference from sample statistics and margin of error",
        question_type: "sample-inference",
        keywords: &["margin of error", "sample", "population", "estimate", "surveyed", "plausible"],
        avoid: &["scatterplot", "probability", "experiment"],
        canonical_phrasing: "Which of the following is the most appropriate conclusion about the population?",
        passage_constraints: "A survey context reporting a sample statistic and margin of error.",
        choice_style: "Four conclusions about the population; distractors over-generalize.",
    },
    SubtopicLeaf {
        topic: Topic::ProblemSolvingAndDataAnalysis,
        name: "Evaluating statistical claims: observational studies and experiments",
        question_type: "statistical-claims",
        keywords: &["experiment", "observational study", "randomly assigned", "causal", "conclusion", "random assignment"],
        avoid: &["margin of error", "scatterplot", "median"],
        canonical_phrasing: "Which conclusion is best supported by the design of the study?",
        passage_constraints: "A description of a study's sampling and assignment design.",
        choice_style: "Four conclusions differing in scope (causal vs. associative, sample vs. population).",
    },
    // ---------- Geometry and Trigonometry ----------
    SubtopicLeaf {
        topic: Topic::GeometryAndTrigonometry,
        name: "Area and volume",
        question_type: "area-volume",
        keywords: &["area", "volume", "surface area", "cube", "cylinder", "rectangle", "prism", "square units"],
        avoid: &["sine", "cosine", "probability"],
        canonical_phrasing: "What is the volume, in cubic centimeters, of the solid?",
        passage_constraints: "A 2D figure or 3D solid with given dimensions.",
        choice_style: "Four numeric values with units.",
    },
    SubtopicLeaf {
        topic: Topic::GeometryAndTrigonometry,
        name: "Lines, angles, and triangles",
        question_type: "lines-angles-triangles",
        keywords: &["angle", "triangle", "parallel", "transversal", "degrees", "congruent", "similar", "°"],
        avoid: &["radius", "circle", "sine", "volume"],
        canonical_phrasing: "In the figure shown, line m is parallel to line n. What is the value of x?",
        passage_constraints: "A figure with intersecting lines or triangles; all needed angle measures stated.",
        choice_style: "Four angle measures or lengths.",
    },
    SubtopicLeaf {
        topic: Topic::GeometryAndTrigonometry,
        name: "Right triangles and trigonometry",
        question_type: "right-triangle-trig",
        keywords: &["right triangle", "sine", "cosine", "tangent", "sin", "cos", "tan", "hypotenuse", "pythagorean"],
        avoid: &["circle", "volume", "parallel"],
        canonical_phrasing: "In right triangle ABC, angle C is a right angle. What is the value of sin A?",
        passage_constraints: "A right triangle with labeled vertices and given side lengths or angle measures.",
        choice_style: "Four ratios or lengths.",
    },
    SubtopicLeaf {
        topic: Topic::GeometryAndTrigonometry,
        name: "Circles",
        question_type: "circles",
        keywords: &["circle", "radius", "diameter", "circumference", "arc", "central angle", "chord", "sector", "radians", "center"],
        avoid: &["volume", "hypotenuse", "parallel lines"],
        canonical_phrasing: "A circle has center O and radius r. What is the length of arc AB?",
        passage_constraints: "A circle with stated center and radius or diameter; arc or angle measures given explicitly.",
        choice_style: "Four numeric values, possibly in terms of π.",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_aliases() {
        assert_eq!(Topic::resolve("Geometry and Trigonometry"), Some(Topic::GeometryAndTrigonometry));
        assert_eq!(Topic::resolve("advanced_math"), Some(Topic::AdvancedMath));
        assert_eq!(Topic::resolve("PSDA"), Some(Topic::ProblemSolvingAndDataAnalysis));
        assert_eq!(Topic::resolve("calculus"), None);
    }

    #[test]
    fn test_every_topic_has_leaves() {
        for topic in Topic::ALL {
            assert!(topic.leaves().count() >= 2, "{} 缺少技能点", topic);
        }
    }

    #[test]
    fn test_find_leaf_partial_name() {
        let leaf = find_leaf(Topic::ProblemSolvingAndDataAnalysis, "percentages").unwrap();
        assert_eq!(leaf.name, "Percentages");
        let leaf = find_leaf(Topic::ExpressionOfIdeas, "Rhetorical Synthesis").unwrap();
        assert_eq!(leaf.question_type, "rhetorical-synthesis");
        assert!(find_leaf(Topic::Algebra, "Circles").is_none());
    }

    #[test]
    fn test_synthesis_and_central_idea_vocab_disjoint() {
        let synthesis = find_leaf(Topic::ExpressionOfIdeas, "Rhetorical Synthesis").unwrap();
        let central = find_leaf(Topic::InformationAndIdeas, "Central Ideas and Details").unwrap();
        for kw in synthesis.keywords {
            assert!(!central.keywords.contains(kw));
        }
        assert!(synthesis.avoid.contains(&"main idea"));
    }
}
