use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{Category, Sentiment};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Keyword sets in match priority. A message matching several sets gets the first one.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::EvenementsCulturels,
        &[
            "événement", "evenement", "festival", "concert", "spectacle", "exposition", "culture", "musée",
            "musee", "théâtre", "theatre",
        ],
    ),
    (
        Category::ProgrammesJeunesse,
        &["jeune", "jeunesse", "bourse", "stage", "étudiant", "etudiant", "atelier", "emploi"],
    ),
    (
        Category::Documents,
        &["document", "formulaire", "certificat", "attestation", "dossier", "papier"],
    ),
    (
        Category::Plaintes,
        &["plainte", "réclamation", "reclamation", "problème", "probleme", "signaler"],
    ),
    (
        Category::Informations,
        &["information", "horaire", "adresse", "contact", "renseignement"],
    ),
    (Category::Service, &["service", "rendez-vous", "guichet"]),
    (Category::Actualites, &["actualité", "actualite", "annonce", "nouveauté", "nouveaute"]),
    (Category::Questions, &["question", "pourquoi", "comment"]),
];

// "excellent" contains "lent" and "mécontent" contains "content", so the
// lists avoid bare fragments that would double count.
const POSITIVE_WORDS: &[&str] = &[
    "merci", "super", "excellent", "génial", "genial", "parfait", "bravo", "très bien", "tres bien", "ravi",
];
const NEGATIVE_WORDS: &[&str] = &[
    "problème", "probleme", "mauvais", "déçu", "decu", "trop lent", "attente", "impossible", "insatisfait",
    "inacceptable",
];

/// Lower-cases and collapses whitespace so multi-word keywords line up.
fn normalise(message: &str) -> String {
    WHITESPACE_RE.replace_all(message.trim(), " ").to_lowercase()
}

pub fn classify(message: &str) -> (Category, Sentiment) {
    let normalised = normalise(message);
    (category_of(&normalised), sentiment_of(&normalised))
}

pub fn categorize(message: &str) -> Category {
    category_of(&normalise(message))
}

pub fn analyze_sentiment(message: &str) -> Sentiment {
    sentiment_of(&normalise(message))
}

fn category_of(normalised: &str) -> Category {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| normalised.contains(keyword)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::General)
}

fn sentiment_of(normalised: &str) -> Sentiment {
    let positive = count_occurrences(normalised, POSITIVE_WORDS);
    let negative = count_occurrences(normalised, NEGATIVE_WORDS);
    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

fn count_occurrences(text: &str, words: &[&str]) -> usize {
    words.iter().map(|word| text.matches(word).count()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_is_general_and_neutral() {
        assert_eq!(classify(""), (Category::General, Sentiment::Neutral));
        assert_eq!(classify("   \n\t"), (Category::General, Sentiment::Neutral));
    }

    #[test]
    fn each_keyword_set_maps_to_its_category() {
        for (category, keywords) in CATEGORY_KEYWORDS {
            for keyword in *keywords {
                let message = format!("Bonjour, {keyword} svp");
                assert_eq!(categorize(&message), *category, "keyword {keyword:?}");
            }
        }
    }

    #[test]
    fn higher_priority_category_wins() {
        // "festival" is cultural, "formulaire" is documents
        assert_eq!(
            categorize("Le formulaire pour le festival"),
            Category::EvenementsCulturels
        );
        assert_eq!(categorize("Une plainte au sujet de mon dossier"), Category::Documents);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(categorize("CONCERT ce soir ?"), Category::EvenementsCulturels);
        assert_eq!(analyze_sentiment("MERCI BEAUCOUP"), Sentiment::Positive);
    }

    #[test]
    fn unmatched_text_is_general() {
        assert_eq!(categorize("Bonjour à tous"), Category::General);
    }

    #[test]
    fn sentiment_compares_occurrence_counts() {
        assert_eq!(analyze_sentiment("merci, merci, mais quelle attente"), Sentiment::Positive);
        assert_eq!(analyze_sentiment("merci mais l'attente est inacceptable"), Sentiment::Negative);
        assert_eq!(analyze_sentiment("super mais mauvais"), Sentiment::Neutral);
        assert_eq!(analyze_sentiment("rien à signaler"), Sentiment::Neutral);
    }

    #[test]
    fn multi_word_keywords_survive_irregular_spacing() {
        assert_eq!(analyze_sentiment("c'est   très\tbien"), Sentiment::Positive);
        assert_eq!(analyze_sentiment("le guichet est trop\n lent"), Sentiment::Negative);
    }

    #[test]
    fn substrings_do_not_double_count() {
        assert_eq!(analyze_sentiment("excellent"), Sentiment::Positive);
        assert_eq!(analyze_sentiment("je suis insatisfait"), Sentiment::Negative);
    }
}
