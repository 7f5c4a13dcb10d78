//! Rule validation: deterministic threshold checks against invoice fields.

use crate::pipeline::context::RunState;
use crate::pipeline::stage_trait::PipelineStage;
use anyhow::Result;
use async_trait::async_trait;
use freightguard_core::{AnomalyKind, AnomalyRecord, ServiceClass, Severity};
use tracing::debug;

pub struct ValidateStage;

#[async_trait]
impl PipelineStage for ValidateStage {
    fn name(&self) -> &'static str {
        "ValidateStage"
    }

    /// Checks run in fixed order: cost/km, then cost/kg, then the
    /// service-weight mismatch. Malformed input aborts the run; validation
    /// never silently proceeds.
    async fn execute(&self, state: &mut RunState) -> Result<()> {
        state.invoice.validate()?;

        let rules = &state.policy.rules;
        let invoice = &state.invoice;

        let cost_per_km = invoice.cost_per_km()?;
        if cost_per_km > rules.max_cost_per_km {
            debug!(
                invoice = %invoice.id,
                cost_per_km,
                "cost per km exceeds threshold"
            );
            state.anomalies.push(AnomalyRecord::rule(
                AnomalyKind::HighCostPerKm,
                Severity::Medium,
                format!(
                    "Cost per km is {:.2}, above the {:.2} threshold",
                    cost_per_km, rules.max_cost_per_km
                ),
            ));
        }

        let cost_per_kg = invoice.cost_per_kg()?;
        if cost_per_kg > rules.max_cost_per_kg {
            debug!(
                invoice = %invoice.id,
                cost_per_kg,
                "cost per kg exceeds threshold"
            );
            state.anomalies.push(AnomalyRecord::rule(
                AnomalyKind::HighCostPerKg,
                Severity::Medium,
                format!(
                    "Cost per kg is {:.2}, above the {:.2} threshold",
                    cost_per_kg, rules.max_cost_per_kg
                ),
            ));
        }

        if invoice.service == ServiceClass::Express
            && invoice.weight_kg > rules.express_heavy_weight_kg
        {
            state.anomalies.push(AnomalyRecord::rule(
                AnomalyKind::ExpressHeavyShipment,
                Severity::Low,
                format!(
                    "Express service booked for a {:.0} kg shipment (over {:.0} kg)",
                    invoice.weight_kg, rules.express_heavy_weight_kg
                ),
            ));
        }

        debug!(
            invoice = %invoice.id,
            rule_anomalies = state.anomalies.len(),
            "rule validation complete"
        );

        Ok(())
    }
}
