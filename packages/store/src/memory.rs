//! In-memory [`SurveyStore`] over respondent rows.

use std::collections::BTreeMap;

use async_trait::async_trait;
use survey_map_survey_models::{
    Filter, NeighborhoodCount, Question, QuestionCatalog, ResponseOption,
};

use crate::{StoreError, SurveyStore};

/// One survey respondent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Respondent {
    /// Neighborhood of residence.
    pub barrio: String,
    /// Locality containing the neighborhood.
    pub localidad: String,
    /// Home x coordinate, if geocoded.
    pub coordx: Option<f64>,
    /// Home y coordinate, if geocoded.
    pub coordsy: Option<f64>,
    /// Question id → response. Unanswered questions are absent.
    pub answers: BTreeMap<String, String>,
}

impl Respondent {
    /// Response given to a question.
    #[must_use]
    pub fn answer(&self, question_id: &str) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    /// Whether every filter matches this respondent's answers.
    #[must_use]
    pub fn satisfies(&self, filters: &[Filter]) -> bool {
        filters
            .iter()
            .all(|f| self.answer(&f.question_id) == Some(f.response.as_str()))
    }
}

#[derive(Default)]
struct Tally {
    total: i64,
    matches: i64,
    sum_x: f64,
    sum_y: f64,
    located: u32,
}

/// Survey store that aggregates respondents held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    catalog: QuestionCatalog,
    respondents: Vec<Respondent>,
}

impl MemoryStore {
    /// Creates a store from a catalog and respondent rows.
    #[must_use]
    pub fn new(catalog: QuestionCatalog, respondents: Vec<Respondent>) -> Self {
        log::info!(
            "Memory store holds {} respondents and {} questions",
            respondents.len(),
            catalog.len()
        );
        Self {
            catalog,
            respondents,
        }
    }

    /// Respondent rows.
    #[must_use]
    pub fn respondents(&self) -> &[Respondent] {
        &self.respondents
    }

    fn distinct_responses(&self, question_id: &str) -> u32 {
        let mut values: Vec<&str> = self
            .respondents
            .iter()
            .filter_map(|r| r.answer(question_id))
            .collect();
        values.sort_unstable();
        values.dedup();
        u32::try_from(values.len()).unwrap_or(u32::MAX)
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn aggregate(&self, filters: &[Filter]) -> Result<Vec<NeighborhoodCount>, StoreError> {
        let mut tallies: BTreeMap<(&str, &str), Tally> = BTreeMap::new();

        for respondent in &self.respondents {
            let tally = tallies
                .entry((respondent.barrio.as_str(), respondent.localidad.as_str()))
                .or_default();
            tally.total += 1;
            if !filters.is_empty() && respondent.satisfies(filters) {
                tally.matches += 1;
            }
            if let (Some(x), Some(y)) = (respondent.coordx, respondent.coordsy) {
                tally.sum_x += x;
                tally.sum_y += y;
                tally.located += 1;
            }
        }

        Ok(tallies
            .into_iter()
            .map(|((barrio, localidad), tally)| {
                let located = f64::from(tally.located.max(1));
                NeighborhoodCount {
                    barrio: barrio.to_string(),
                    localidad: localidad.to_string(),
                    coordx: tally.sum_x / located,
                    coordsy: tally.sum_y / located,
                    total_encuestas: tally.total,
                    matches_count: (!filters.is_empty()).then_some(tally.matches),
                }
            })
            .collect())
    }

    async fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.catalog.categories().map(str::to_string).collect())
    }

    async fn list_questions(&self, category: &str) -> Result<Vec<Question>, StoreError> {
        Ok(self
            .catalog
            .questions(category)
            .iter()
            .map(|q| Question {
                response_count: self.distinct_responses(&q.question_id),
                ..q.clone()
            })
            .collect())
    }

    #[allow(clippy::cast_precision_loss)]
    async fn list_responses(
        &self,
        question_id: &str,
        category: Option<&str>,
    ) -> Result<Vec<ResponseOption>, StoreError> {
        if category.is_some_and(|c| self.catalog.category_of(question_id) != Some(c)) {
            return Ok(Vec::new());
        }

        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for answer in self.respondents.iter().filter_map(|r| r.answer(question_id)) {
            *counts.entry(answer).or_default() += 1;
        }
        let answered: u64 = counts.values().sum();

        let mut options: Vec<ResponseOption> = counts
            .into_iter()
            .map(|(value, count)| ResponseOption {
                value: value.to_string(),
                count,
                percentage: count as f64 / answered.max(1) as f64 * 100.0,
            })
            .collect();
        options.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));

        Ok(options)
    }
}
