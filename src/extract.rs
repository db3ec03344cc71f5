use once_cell::sync::Lazy;
use regex::Regex;

use crate::matching::CardRead;
use crate::ocr::OcrResponse;

/// Fields recovered from raw OCR text when the OCR service did not
/// extract them itself.
#[derive(Debug, Clone, Default)]
pub struct ExtractedFields {
    pub student_code: Option<String>,
    pub student_name: Option<String>,
}

static PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["',]"#).expect("punct pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

// Frequent OCR misreads on PTIT card headers and field labels.
static WORD_FIXES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\bP\s*T\s*IT\b|\bP7IT\b|\bPIT\b", "PTIT"),
        (r"\bS1NH\b|\bSLNH\b|\bSINN\b", "SINH"),
        (r"\bV1EN\b|\bVIÉN\b", "VIÊN"),
        (r"\bH0C\b", "HỌC"),
        (r"\bL0P\b", "LỚP"),
        (r"\bTRU0NG\b", "TRƯỜNG"),
    ]
    .into_iter()
    .map(|(pattern, fix)| (Regex::new(pattern).expect("word fix pattern"), fix))
    .collect()
});

static VALID_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[BDCL][0-9][A-Z0-9]{6,8}$").expect("code pattern"));

static LABELED_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:M[AÃ]\s*S[OỐ]\s*SINH\s*VI[EÊ]N|MSSV|MSV)[:\s]*([BDCL][0-9][A-Z0-9]{6,8})\b")
        .expect("labeled code pattern")
});

static BARE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([BDCL][0-9][A-Z0-9]{6,8})\b").expect("bare code pattern"));

static LABELED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:H[OỌ]\s*V[AÀ]\s*T[EÊ]N|H[OỌ]\s*T[EÊ]N)[:\s]*([\p{Lu}\s]+?)(?:SINH\s*NG[AÀ]Y|NG[AÀ]Y\s*SINH|L[OỚ]P|NG[AÀ]NH|KH[OÓ]A|MSSV|MSV|M[AÃ]\s*S[OỐ]|$)",
    )
    .expect("labeled name pattern")
});

/// Registration-time validation of the card code format.
pub fn is_card_code(code: &str) -> bool {
    VALID_CODE.is_match(code)
}

/// Uppercase, strip stray punctuation, repair frequent OCR misreads, and
/// collapse all whitespace runs (including newlines) to single spaces.
pub fn normalize_ocr_text(text: &str) -> String {
    let mut normalized = text.to_uppercase();
    normalized = PUNCT.replace_all(&normalized, " ").into_owned();
    for (pattern, fix) in WORD_FIXES.iter() {
        normalized = pattern.replace_all(&normalized, *fix).into_owned();
    }
    WHITESPACE.replace_all(normalized.trim(), " ").into_owned()
}

/// Pull a card code and a holder name out of raw OCR text. Labeled fields
/// win over a bare code found anywhere in the text.
pub fn extract_card_fields(text: &str) -> ExtractedFields {
    let normalized = normalize_ocr_text(text);

    let student_code = LABELED_CODE
        .captures(&normalized)
        .or_else(|| BARE_CODE.captures(&normalized))
        .map(|caps| caps[1].to_string());

    let student_name = LABELED_NAME
        .captures(&normalized)
        .map(|caps| proper_case(caps[1].trim()))
        .filter(|name| !name.is_empty());

    ExtractedFields {
        student_code,
        student_name,
    }
}

/// Merge the OCR response with fields recovered from its raw text; fields
/// the service extracted itself are kept as-is.
pub fn merge_card_fields(ocr: &OcrResponse) -> CardRead {
    let recovered = extract_card_fields(&ocr.ocr_text);

    CardRead {
        student_code: non_empty(ocr.student_id.clone()).or(recovered.student_code),
        student_name: non_empty(ocr.student_name.clone()).or(recovered.student_name),
        confidence: ocr.confidence,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn proper_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD_TEXT: &str = "HỌC VIỆN CÔNG NGHỆ BƯU CHÍNH VIỄN THÔNG\n\
                             THẺ SINH VIÊN\n\
                             Mã số sinh viên: B21DCVT020\n\
                             Họ và tên: NGUYỄN VĂN AN\n\
                             Lớp: D21CQVT01-B";

    #[test]
    fn validates_card_codes() {
        assert!(is_card_code("B21DCVT020"));
        assert!(is_card_code("D19DCCN123"));
        assert!(is_card_code("L20CQCN01"));
        assert!(!is_card_code("X21DCVT020"));
        assert!(!is_card_code("b21dcvt020"));
        assert!(!is_card_code("B21"));
        assert!(!is_card_code("B21DCVT020TOOLONG"));
    }

    #[test]
    fn normalization_repairs_misreads_and_whitespace() {
        let normalized = normalize_ocr_text("H0C  VIỆN\nTHẺ S1NH V1EN, 'PIT'");
        assert_eq!(normalized, "HỌC VIỆN THẺ SINH VIÊN PTIT");
    }

    #[test]
    fn extracts_labeled_code_and_name() {
        let fields = extract_card_fields(CARD_TEXT);
        assert_eq!(fields.student_code.as_deref(), Some("B21DCVT020"));
        assert_eq!(fields.student_name.as_deref(), Some("Nguyễn Văn An"));
    }

    #[test]
    fn falls_back_to_bare_code_anywhere_in_text() {
        let fields = extract_card_fields("some noise B21DCVT020 more noise");
        assert_eq!(fields.student_code.as_deref(), Some("B21DCVT020"));
        assert_eq!(fields.student_name, None);
    }

    #[test]
    fn tolerates_unaccented_labels() {
        let fields = extract_card_fields("Ma so sinh vien: B21DCAT055\nHo va ten: LE VAN CUONG\nLop: D21");
        assert_eq!(fields.student_code.as_deref(), Some("B21DCAT055"));
        assert_eq!(fields.student_name.as_deref(), Some("Le Van Cuong"));
    }

    #[test]
    fn no_fields_in_unrelated_text() {
        let fields = extract_card_fields("quarterly cafeteria menu");
        assert_eq!(fields.student_code, None);
        assert_eq!(fields.student_name, None);
    }

    #[test]
    fn merge_prefers_service_extracted_fields() {
        let ocr = OcrResponse {
            student_id: Some("B21DCCN101".to_string()),
            student_name: Some("Trần Thị Bích".to_string()),
            confidence: 88.0,
            ocr_text: CARD_TEXT.to_string(),
        };
        let read = merge_card_fields(&ocr);
        assert_eq!(read.student_code.as_deref(), Some("B21DCCN101"));
        assert_eq!(read.student_name.as_deref(), Some("Trần Thị Bích"));
        assert_eq!(read.confidence, 88.0);
    }

    #[test]
    fn merge_fills_gaps_from_raw_text() {
        let ocr = OcrResponse {
            student_id: None,
            student_name: Some("  ".to_string()),
            confidence: 91.0,
            ocr_text: CARD_TEXT.to_string(),
        };
        let read = merge_card_fields(&ocr);
        assert_eq!(read.student_code.as_deref(), Some("B21DCVT020"));
        assert_eq!(read.student_name.as_deref(), Some("Nguyễn Văn An"));
    }
}
