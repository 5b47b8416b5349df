use chrono::NaiveDate;

use super::catalog::{CompilationProfile, RuleCatalog};
use super::domain::{MatterDocument, MatterFacts};
use super::evaluation::{
    EvaluationConfig, RequirementEvaluator, RequirementStatus, RuleValidator, RuleViolation,
    ValidationContext,
};
use super::planner::{CompilationPlan, CompilationPlanner, PlanningError};
use super::readiness::{ReadinessAggregator, ReadinessVerdict};
use super::sections::{RecordSection, RecordSectionBuilder};

/// Immutable inputs for one compilation pass.
#[derive(Debug, Clone, Copy)]
pub struct CompilationInput<'a> {
    pub profile: &'a CompilationProfile,
    pub catalog: &'a RuleCatalog,
    pub documents: &'a [MatterDocument],
    pub facts: &'a MatterFacts,
    pub as_of: Option<NaiveDate>,
}

/// Every derived view of one pass. Identical inputs yield identical outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationOutcome {
    pub requirement_statuses: Vec<RequirementStatus>,
    pub rule_violations: Vec<RuleViolation>,
    pub record_sections: Vec<RecordSection>,
    pub plan: CompilationPlan,
    pub verdict: ReadinessVerdict,
}

/// Pure pipeline: evaluate, plan, validate, section, aggregate.
pub struct CompilationEngine {
    evaluator: RequirementEvaluator,
    validator: RuleValidator,
    sections: RecordSectionBuilder,
    planner: CompilationPlanner,
    aggregator: ReadinessAggregator,
}

impl CompilationEngine {
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            evaluator: RequirementEvaluator::new(config),
            validator: RuleValidator,
            sections: RecordSectionBuilder::new(config),
            planner: CompilationPlanner,
            aggregator: ReadinessAggregator,
        }
    }

    pub fn run(&self, input: &CompilationInput<'_>) -> Result<CompilationOutcome, PlanningError> {
        let requirement_statuses =
            self.evaluator
                .evaluate(input.profile, input.catalog, input.documents);
        // The pagination predicate reads the plan, so planning precedes validation.
        let plan = self.planner.plan(input.profile, input.documents)?;
        let rule_violations = self.validator.validate(&ValidationContext {
            profile: input.profile,
            catalog: input.catalog,
            documents: input.documents,
            statuses: &requirement_statuses,
            plan: &plan,
            facts: input.facts,
            as_of: input.as_of,
        });
        let record_sections = self
            .sections
            .build(input.profile, input.catalog, input.documents);
        let verdict =
            self.aggregator
                .aggregate(&requirement_statuses, &rule_violations, &record_sections);

        Ok(CompilationOutcome {
            requirement_statuses,
            rule_violations,
            record_sections,
            plan,
            verdict,
        })
    }
}

impl Default for CompilationEngine {
    fn default() -> Self {
        Self::new(EvaluationConfig::default())
    }
}
