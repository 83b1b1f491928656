//! Content-keyword lexicons for scoring.
//!
//! Keyword tables are configured per language, with built-in defaults for
//! English and Indonesian. A TOML file named by `LEXICON_FILE` can replace
//! any language's tables wholesale; languages absent from the file keep the
//! built-in defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Keyword tables for one language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    /// Sentence-opener keywords signalling a strong opening.
    pub hook: Vec<String>,
    /// Affective vocabulary.
    pub emotional: Vec<String>,
    /// Opinion and dispute markers.
    pub controversial: Vec<String>,
    /// Explanatory markers.
    pub educational: Vec<String>,
    /// Humor and spectacle markers.
    pub entertaining: Vec<String>,
    /// Monetization cues.
    pub money: Vec<String>,
    /// Time-pressure cues.
    pub urgency: Vec<String>,
    /// Disfluencies, scored negatively.
    pub filler: Vec<String>,
    /// Mid-sentence transition words that disqualify a clip opening.
    pub transitions: Vec<String>,
    /// Conclusion phrases that qualify a clip ending.
    pub conclusions: Vec<String>,
}

/// All configured languages.
#[derive(Debug, Clone)]
pub struct LexiconSet {
    languages: BTreeMap<String, Lexicon>,
}

/// On-disk shape of a lexicon override file: one table per language tag.
#[derive(Debug, Deserialize)]
struct LexiconFile {
    #[serde(flatten)]
    languages: BTreeMap<String, Lexicon>,
}

impl LexiconSet {
    /// The built-in English and Indonesian tables.
    pub fn builtin() -> Self {
        let mut languages = BTreeMap::new();
        languages.insert("en".to_string(), english());
        languages.insert("id".to_string(), indonesian());
        Self { languages }
    }

    /// Built-in tables with any languages in `path` replaced.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::LexiconRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file: LexiconFile = toml::from_str(&raw).map_err(|source| Error::LexiconParse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut set = Self::builtin();
        for (tag, lexicon) in file.languages {
            set.languages.insert(tag.to_ascii_lowercase(), lexicon);
        }
        Ok(set)
    }

    /// Tables for a language tag, matching on the primary subtag.
    ///
    /// Unknown languages fall back to English, which keeps scoring defined
    /// for whatever the decoder detects.
    pub fn for_language(&self, tag: &str) -> &Lexicon {
        let primary = tag
            .split(['-', '_'])
            .next()
            .unwrap_or(tag)
            .to_ascii_lowercase();
        self.languages
            .get(&primary)
            .or_else(|| self.languages.get("en"))
            .unwrap_or_else(|| {
                // builtin() always seeds "en"; a custom set without it still
                // needs a defined answer.
                self.languages
                    .values()
                    .next()
                    .map_or(&EMPTY_LEXICON, |first| first)
            })
    }

    /// Configured language tags.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }
}

static EMPTY_LEXICON: std::sync::LazyLock<Lexicon> = std::sync::LazyLock::new(Lexicon::default);

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| (*w).to_string()).collect()
}

#[rustfmt::skip]
fn english() -> Lexicon {
    Lexicon {
        hook: words(&[
            "imagine", "secret", "nobody", "everyone", "stop", "wait", "listen",
            "warning", "attention", "shocking", "revealed", "truth", "finally",
            "what if", "did you know", "here's the thing", "the real reason",
        ]),
        emotional: words(&[
            "love", "hate", "cry", "tears", "heartbreaking", "amazing",
            "incredible", "terrifying", "beautiful", "devastating", "proud",
            "angry", "happy", "sad", "fear", "hope", "regret", "grateful",
            "unforgettable", "painful",
        ]),
        controversial: words(&[
            "wrong", "lie", "scam", "exposed", "controversial", "banned",
            "illegal", "myth", "debunked", "unpopular", "disagree", "hot take",
            "cover up", "they don't want", "nobody talks about",
        ]),
        educational: words(&[
            "how to", "why", "learn", "explain", "example", "step", "tip",
            "trick", "lesson", "understand", "means", "definition", "research",
            "study", "science", "fact", "method", "principle",
        ]),
        entertaining: words(&[
            "funny", "hilarious", "crazy", "insane", "epic", "unbelievable",
            "wild", "ridiculous", "joke", "laugh", "prank", "fail", "wow",
            "absurd", "bizarre",
        ]),
        money: words(&[
            "money", "dollar", "profit", "income", "salary", "invest",
            "investment", "rich", "wealth", "million", "billion", "price",
            "cost", "free", "discount", "earn", "revenue", "business",
        ]),
        urgency: words(&[
            "now", "today", "hurry", "deadline", "limited", "immediately",
            "urgent", "quick", "instantly", "soon", "last chance", "before",
            "don't wait", "running out",
        ]),
        filler: words(&[
            "um", "uh", "erm", "like", "you know", "i mean", "basically",
            "actually", "literally", "kind of", "sort of", "okay so", "well",
            "anyway", "stuff",
        ]),
        transitions: words(&[
            "and", "but", "or", "so", "because", "however", "although",
            "though", "which", "that", "then", "also", "plus", "since",
            "while", "whereas", "therefore", "thus", "moreover", "furthermore",
            "besides", "meanwhile", "anyway", "instead", "otherwise", "nor",
            "yet", "until", "unless", "if", "even", "especially",
            "particularly", "including", "such", "like", "than", "as", "for",
            "with", "without", "except", "despite", "regardless",
            "additionally", "consequently", "hence", "accordingly", "likewise",
            "similarly",
        ]),
        conclusions: words(&[
            "that's why", "in conclusion", "to sum up", "in summary",
            "at the end of the day", "that's it", "and that's how",
            "the bottom line", "long story short", "in the end",
            "so there you have it", "that's the point", "that's all",
            "moral of the story", "overall", "to wrap up", "simply put",
            "all in all", "in short", "which is why", "and that's why",
            "so remember", "the takeaway", "lesson learned", "end of story",
            "case closed", "the key thing", "what matters is",
            "remember that", "keep that in mind",
        ]),
    }
}

#[rustfmt::skip]
fn indonesian() -> Lexicon {
    Lexicon {
        hook: words(&[
            "bayangkan", "ternyata", "rahasia", "jangan", "dengar",
            "perhatikan", "faktanya", "inilah", "begini", "sumpah", "jujur",
            "penting", "tahukah kamu", "siapa sangka",
        ]),
        emotional: words(&[
            "cinta", "benci", "menangis", "sedih", "bahagia", "takut",
            "marah", "bangga", "kecewa", "terharu", "menyentuh",
            "mengharukan", "menyakitkan", "kangen", "rindu", "syukur",
            "luar biasa",
        ]),
        controversial: words(&[
            "salah", "bohong", "penipuan", "kontroversi", "dilarang",
            "haram", "mitos", "terbongkar", "skandal", "dusta", "hoax",
            "sensasi", "tidak setuju", "jangan percaya",
        ]),
        educational: words(&[
            "cara", "kenapa", "mengapa", "belajar", "jelaskan", "contoh",
            "langkah", "tips", "trik", "pelajaran", "artinya", "maksudnya",
            "penelitian", "ilmu", "fakta", "pahami",
        ]),
        entertaining: words(&[
            "lucu", "kocak", "ngakak", "gila", "seru", "heboh", "konyol",
            "aneh", "keren", "mantap", "gokil", "candaan", "becanda",
        ]),
        money: words(&[
            "uang", "duit", "rupiah", "untung", "gaji", "investasi", "kaya",
            "miskin", "juta", "miliar", "harga", "gratis", "diskon",
            "bisnis", "modal", "cuan", "penghasilan",
        ]),
        urgency: words(&[
            "sekarang", "segera", "buruan", "cepat", "terbatas", "terakhir",
            "sebelum", "langsung", "kesempatan", "keburu", "mumpung",
            "jangan sampai", "detik ini", "hari ini",
        ]),
        filler: words(&[
            "eh", "anu", "gitu", "kayak", "emm", "hmm", "pokoknya",
            "sebenarnya", "ya kan", "gimana ya", "apa ya", "jadi gini",
            "apa namanya", "maksudnya",
        ]),
        transitions: words(&[
            "dan", "tapi", "tetapi", "atau", "jadi", "karena", "namun",
            "walaupun", "meskipun", "yang", "lalu", "kemudian", "juga",
            "serta", "sejak", "sementara", "sedangkan", "maka", "apalagi",
            "bahkan", "padahal", "sehingga", "supaya", "agar", "kalau",
            "jika", "sampai", "kecuali", "seperti", "daripada", "sebagai",
            "untuk", "dengan", "tanpa", "terus", "selanjutnya", "misalnya",
            "contohnya", "terutama", "termasuk", "sebelumnya", "pertama",
            "kedua", "soalnya", "oleh karena itu", "selain itu",
            "habis itu", "setelah itu", "akhirnya", "biar",
        ]),
        conclusions: words(&[
            "kesimpulannya", "intinya", "itulah", "akhir kata",
            "pada akhirnya", "singkatnya", "itu saja", "sekian", "demikian",
            "begitulah", "makanya", "pelajarannya", "hikmahnya", "ingat",
            "kuncinya", "terima kasih", "selesai", "tamat", "itu dia",
            "jadi begitulah", "itulah mengapa", "jadi intinya",
            "pesan saya", "yang penting", "pada intinya", "simpulannya",
            "sampai jumpa", "semoga bermanfaat", "cukup sekian",
            "pokoknya begitu",
        ]),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_covers_english_and_indonesian() {
        let set = LexiconSet::builtin();
        let tags: Vec<&str> = set.languages().collect();
        assert_eq!(tags, vec!["en", "id"]);
        assert!(!set.for_language("en").hook.is_empty());
        assert!(!set.for_language("id").transitions.is_empty());
    }

    #[test]
    fn transition_and_conclusion_tables_are_substantial() {
        let set = LexiconSet::builtin();
        for tag in ["en", "id"] {
            let lex = set.for_language(tag);
            assert!(lex.transitions.len() >= 40, "{tag} transitions too small");
            assert!(lex.conclusions.len() >= 25, "{tag} conclusions too small");
        }
    }

    #[test]
    fn language_matching_uses_primary_subtag() {
        let set = LexiconSet::builtin();
        assert_eq!(
            set.for_language("id-ID").hook,
            set.for_language("id").hook
        );
        // Unknown languages fall back to English.
        assert_eq!(set.for_language("fr").hook, set.for_language("en").hook);
    }

    #[test]
    fn file_overrides_replace_one_language() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[en]\nhook = [\"bombshell\"]\nfiller = [\"um\"]\n"
        )
        .unwrap();

        let set = LexiconSet::load(file.path()).unwrap();
        assert_eq!(set.for_language("en").hook, vec!["bombshell".to_string()]);
        // Replaced wholesale: unlisted tables become empty.
        assert!(set.for_language("en").transitions.is_empty());
        // Other languages keep their defaults.
        assert!(!set.for_language("id").hook.is_empty());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not [valid toml").unwrap();
        assert!(matches!(
            LexiconSet::load(file.path()),
            Err(Error::LexiconParse { .. })
        ));
    }
}
