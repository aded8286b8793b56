use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_YEAR: &str = "0000";
pub const UNKNOWN_PROVINCE: &str = "未知省份";
pub const UNKNOWN_CITY: &str = "未知城市";
pub const UNKNOWN_SUBJECT: &str = "未知学科";
pub const UNKNOWN_EXAM_TYPE: &str = "未知考试类型";

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})年").expect("year regex"));

/// `(keyword, canonical)` pairs, tried in order; the more specific spelling of an entity comes
/// before its short alias.
const PROVINCES: &[(&str, &str)] = &[
    ("湖南省", "湖南省"),
    ("湖南", "湖南省"),
    ("湖北省", "湖北省"),
    ("湖北", "湖北省"),
    ("江苏省", "江苏省"),
    ("江苏", "江苏省"),
    ("浙江省", "浙江省"),
    ("浙江", "浙江省"),
    ("广东省", "广东省"),
    ("广东", "广东省"),
];

const CITIES: &[(&str, &str)] = &[
    ("湘西州", "湘西州"),
    ("湘西", "湘西州"),
    ("扬州市", "扬州市"),
    ("扬州", "扬州市"),
    ("长沙市", "长沙市"),
    ("长沙", "长沙市"),
    ("武汉市", "武汉市"),
    ("武汉", "武汉市"),
    ("金华市", "金华市"),
    ("金华", "金华市"),
    ("南京市", "南京市"),
    ("南京", "南京市"),
    ("杭州市", "杭州市"),
    ("杭州", "杭州市"),
    ("广州市", "广州市"),
    ("广州", "广州市"),
    ("徐州市", "徐州市"),
    ("徐州", "徐州市"),
    ("苏州市", "苏州市"),
    ("苏州", "苏州市"),
    ("无锡市", "无锡市"),
    ("无锡", "无锡市"),
    ("泰州市", "泰州市"),
    ("泰州", "泰州市"),
];

const SUBJECTS: &[(&str, &str)] = &[
    ("数学", "数学"),
    ("语文", "语文"),
    ("英语", "英语"),
    ("物理", "物理"),
    ("化学", "化学"),
];

const EXAM_TYPES: &[(&str, &str)] = &[
    ("中考", "中考"),
    ("高考", "高考"),
    ("模拟考试", "模拟考试"),
    ("模拟", "模拟考试"),
];

/// Paper-level tags derived from the source file name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub year: String,
    pub province: String,
    pub city: String,
    pub subject: String,
    pub exam_type: String,
}

impl Default for PaperMetadata {
    fn default() -> Self {
        Self {
            year: UNKNOWN_YEAR.to_string(),
            province: UNKNOWN_PROVINCE.to_string(),
            city: UNKNOWN_CITY.to_string(),
            subject: UNKNOWN_SUBJECT.to_string(),
            exam_type: UNKNOWN_EXAM_TYPE.to_string(),
        }
    }
}

impl PaperMetadata {
    /// `<year>-<province>-<city>-<subject>-<exam_type>`
    pub fn stem(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.year, self.province, self.city, self.subject, self.exam_type
        )
    }

    pub fn output_file_name(&self) -> String {
        format!("{}.json", self.stem())
    }
}

fn first_keyword(filename: &str, table: &[(&str, &str)]) -> Option<String> {
    table
        .iter()
        .find(|(keyword, _)| filename.contains(keyword))
        .map(|(_, canonical)| canonical.to_string())
}

/// Never fails: unmatched fields keep their `未知…`/`0000` defaults.
pub fn parse_filename_metadata(filename: &str) -> PaperMetadata {
    let mut meta = PaperMetadata::default();
    if let Some(c) = YEAR_RE.captures(filename) {
        meta.year = c[1].to_string();
    }
    if let Some(v) = first_keyword(filename, PROVINCES) {
        meta.province = v;
    }
    if let Some(v) = first_keyword(filename, CITIES) {
        meta.city = v;
    }
    if let Some(v) = first_keyword(filename, SUBJECTS) {
        meta.subject = v;
    }
    if let Some(v) = first_keyword(filename, EXAM_TYPES) {
        meta.exam_type = v;
    }
    meta
}

/// Stable id for a question (`sub_number == None`) or one of its sub-questions.
pub fn question_id(meta: &PaperMetadata, number: u32, sub_number: Option<u32>) -> String {
    let base = format!("{}-{number:02}", meta.stem());
    match sub_number {
        Some(sub) => format!("{base}-{sub:02}"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_filename_metadata, question_id, PaperMetadata};

    #[test]
    fn parses_full_filename() {
        let meta = parse_filename_metadata("2023年浙江省杭州市中考数学真题（解析版）.docx");
        assert_eq!(
            meta,
            PaperMetadata {
                year: "2023".to_string(),
                province: "浙江省".to_string(),
                city: "杭州市".to_string(),
                subject: "数学".to_string(),
                exam_type: "中考".to_string(),
            }
        );
        assert_eq!(meta.output_file_name(), "2023-浙江省-杭州市-数学-中考.json");
    }

    #[test]
    fn short_aliases_normalize_to_canonical_names() {
        let meta = parse_filename_metadata("2021年湖南湘西物理模拟卷.docx");
        assert_eq!(meta.province, "湖南省");
        assert_eq!(meta.city, "湘西州");
        assert_eq!(meta.subject, "物理");
        assert_eq!(meta.exam_type, "模拟考试");

        let meta = parse_filename_metadata("江苏扬州2019年高考英语.docx");
        assert_eq!(meta.city, "扬州市");
        assert_eq!(meta.year, "2019");
        assert_eq!(meta.exam_type, "高考");
    }

    #[test]
    fn unrecognized_filename_yields_defaults() {
        let meta = parse_filename_metadata("paper-final-v2.docx");
        assert_eq!(meta, PaperMetadata::default());
        assert_eq!(meta.year, "0000");
        assert_eq!(meta.province, "未知省份");
        assert_eq!(meta.exam_type, "未知考试类型");
    }

    #[test]
    fn ids_are_zero_padded() {
        let meta = parse_filename_metadata("2023年浙江省杭州市中考数学.docx");
        assert_eq!(question_id(&meta, 7, None), "2023-浙江省-杭州市-数学-中考-07");
        assert_eq!(question_id(&meta, 21, Some(3)), "2023-浙江省-杭州市-数学-中考-21-03");
        assert_eq!(
            question_id(&PaperMetadata::default(), 1, Some(1)),
            "0000-未知省份-未知城市-未知学科-未知考试类型-01-01"
        );
    }
}
