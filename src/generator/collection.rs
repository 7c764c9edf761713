use super::token::{CssSource, Token, TokenKind};

/// Extra cost per composed token, squared over the number of joins.
pub const CHAIN_PENALTY: u64 = 30;

/// A complete, immutable selector: tokens joined with `>>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    tokens: Vec<Token>,
    score: u64,
}

impl Candidate {
    /// `None` for an empty token list.
    pub fn new(tokens: Vec<Token>) -> Option<Self> {
        if tokens.is_empty() {
            return None;
        }
        let score = combined_score(&tokens);
        Some(Self { tokens, score })
    }

    pub fn single(token: Token) -> Self {
        Self {
            score: token.score,
            tokens: vec![token],
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// New candidate matching `other` within the matches of `self`.
    pub fn append(&self, other: &Candidate) -> Candidate {
        let mut tokens = self.tokens.clone();
        tokens.extend(other.tokens.iter().cloned());
        let score = combined_score(&tokens);
        Candidate { tokens, score }
    }

    pub fn with_token(&self, token: Token) -> Candidate {
        self.append(&Candidate::single(token))
    }

    pub fn with_nth(&self, index: usize, total: usize) -> Candidate {
        self.with_token(Token::nth(index, total))
    }

    /// Whether some token still waits for its CSS to be computed.
    pub fn is_deferred(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(t.kind, TokenKind::Css(CssSource::Deferred(_))))
    }

    /// Replaces deferred tokens with the tokens `materialize` computes for them.
    pub fn resolve<F>(&self, mut materialize: F) -> Candidate
    where
        F: FnMut(ego_tree::NodeId) -> Vec<Token>,
    {
        let mut tokens = Vec::with_capacity(self.tokens.len() + 1);
        for token in &self.tokens {
            match token.kind {
                TokenKind::Css(CssSource::Deferred(element)) => tokens.extend(materialize(element)),
                _ => tokens.push(token.clone()),
            }
        }
        Candidate::new(tokens).unwrap_or_else(|| self.clone())
    }

    /// Joined selector text, `None` while a deferred token is unresolved.
    pub fn render(&self) -> Option<String> {
        let parts = self
            .tokens
            .iter()
            .map(Token::render)
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join(" >> "))
    }
}

fn combined_score(tokens: &[Token]) -> u64 {
    let joins = tokens.len().saturating_sub(1) as u64;
    tokens.iter().map(|t| t.score).sum::<u64>() + CHAIN_PENALTY * joins * joins
}

/// Holds the lowest-scored candidate offered so far.
#[derive(Debug, Clone, Default)]
pub struct CandidateCollection {
    best: Option<Candidate>,
}

impl CandidateCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<Candidate> {
        self.best
    }

    pub fn best_score(&self) -> Option<u64> {
        self.best.as_ref().map(Candidate::score)
    }

    /// True when the held best is at least as good as `score`, so a candidate
    /// scoring `score` or more can be skipped.
    pub fn beats(&self, score: u64) -> bool {
        self.best_score().map(|best| best <= score).unwrap_or(false)
    }

    /// Keeps `candidate` only when strictly better; ties go to the first seen.
    pub fn update_with_candidate(&mut self, candidate: Candidate) -> bool {
        if self.beats(candidate.score()) {
            return false;
        }
        self.best = Some(candidate);
        true
    }

    pub fn merge(&mut self, other: CandidateCollection) {
        if let Some(candidate) = other.best {
            self.update_with_candidate(candidate);
        }
    }

    /// Concatenation of both bests, empty unless both sides resolved.
    pub fn chain(&self, other: &CandidateCollection) -> CandidateCollection {
        let best = match (&self.best, &other.best) {
            (Some(first), Some(second)) => Some(first.append(second)),
            _ => None,
        };
        CandidateCollection { best }
    }
}

impl From<Candidate> for CandidateCollection {
    fn from(candidate: Candidate) -> Self {
        Self {
            best: Some(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::token::{CSS_TAG_NAME, NTH, PARENT_HOP, TEXT};

    #[test]
    fn test_candidate_score_includes_chain_penalty() {
        let text = Candidate::single(Token::text("Go", false));
        assert_eq!(text.score(), TEXT);

        let chained = text.append(&Candidate::single(Token::css("span", CSS_TAG_NAME)));
        assert_eq!(chained.score(), TEXT + CSS_TAG_NAME + CHAIN_PENALTY);

        let three = chained.with_token(Token::parent_path(1));
        assert_eq!(three.score(), TEXT + CSS_TAG_NAME + PARENT_HOP + 4 * CHAIN_PENALTY);
        assert_eq!(three.len(), 3);
        // Composition never mutates its inputs.
        assert_eq!(text.len(), 1);
    }

    #[test]
    fn test_empty_candidate_is_rejected() {
        assert!(Candidate::new(Vec::new()).is_none());
    }

    #[test]
    fn test_collection_keeps_first_of_equal_scores() {
        let mut collection = CandidateCollection::new();
        assert!(collection.update_with_candidate(Candidate::single(Token::css("a", 10))));
        assert!(!collection.update_with_candidate(Candidate::single(Token::css("b", 10))));
        assert!(!collection.update_with_candidate(Candidate::single(Token::css("c", 11))));
        assert!(collection.update_with_candidate(Candidate::single(Token::css("d", 9))));
        assert_eq!(collection.best().and_then(Candidate::render).as_deref(), Some("d"));
    }

    #[test]
    fn test_merge_and_chain() {
        let mut left = CandidateCollection::from(Candidate::single(Token::css("a", 50)));
        let right = CandidateCollection::from(Candidate::single(Token::css("b", 20)));
        let chained = left.chain(&right);
        assert_eq!(chained.best().and_then(Candidate::render).as_deref(), Some("a >> b"));
        assert!(left.chain(&CandidateCollection::new()).best().is_none());

        left.merge(right);
        assert_eq!(left.best_score(), Some(20));
    }

    #[test]
    fn test_with_nth() {
        let li = Candidate::single(Token::css("li", CSS_TAG_NAME));
        let nth = li.with_nth(1, 3);
        assert_eq!(nth.render().as_deref(), Some("li >> nth=1"));
        assert_eq!(nth.score(), CSS_TAG_NAME + NTH + CHAIN_PENALTY);
    }

    #[test]
    fn test_resolve_deferred() {
        let html = scraper::Html::parse_fragment("<p></p>");
        let id = html.tree.root().id();
        let candidate = Candidate::single(Token::deferred_css(id));
        assert!(candidate.is_deferred());
        assert!(candidate.render().is_none());

        let resolved = candidate.resolve(|_| vec![Token::css("p", 1), Token::nth(0, 2)]);
        assert!(!resolved.is_deferred());
        assert_eq!(resolved.render().as_deref(), Some("p >> nth=0"));
    }
}
