//! Lead qualification and micro-offer tools

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, JsonSchema, PropertySchema, Tool, ToolContext, ToolDescriptor, ToolError};
use crate::memory::{LeadIntent, MicroOffer};
use crate::utils::current_timestamp_millis;

// ============================================================================
// qualify_lead
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QualifyArgs {
    intent: String,
    budget: Option<String>,
    timeline: Option<String>,
    #[serde(default)]
    pain_points: Vec<String>,
}

pub struct QualifyLeadTool;

#[async_trait]
impl Tool for QualifyLeadTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "qualify_lead".to_string(),
            description: "Track lead qualification whenever you detect buying intent, budget mentions, timeline, or pain points".to_string(),
            input_schema: JsonSchema::object(
                vec![
                    (
                        "intent",
                        PropertySchema::one_of(
                            "Lead buying intent",
                            &["high", "medium", "low", "unknown"],
                        ),
                    ),
                    ("budget", PropertySchema::string("Budget mentioned by the lead")),
                    ("timeline", PropertySchema::string("Timeline for the purchase decision")),
                    ("painPoints", PropertySchema::string_list("Pain points mentioned by the lead")),
                ],
                &["intent"],
            ),
        }
    }

    async fn execute(&self, arguments: Value, ctx: &mut ToolContext) -> Result<Value, ToolError> {
        let args: QualifyArgs = parse_args(arguments)?;
        let intent = LeadIntent::parse(&args.intent);
        let source = ctx.state.channel.unwrap_or(ctx.channel);

        let lead = &mut ctx.state.lead;
        lead.intent = intent;
        if args.budget.is_some() {
            lead.budget = args.budget;
        }
        if args.timeline.is_some() {
            lead.timeline = args.timeline;
        }
        lead.pain_points.extend(args.pain_points);
        lead.source = Some(source);
        lead.metadata.last_qualified_at = Some(Utc::now());
        lead.metadata.qualification_count += 1;

        ctx.state.lead_intent = intent;

        Ok(json!({
            "success": true,
            "lead": ctx.state.lead,
            "message": format!("Lead qualified as {} intent", intent),
        }))
    }
}

// ============================================================================
// create_micro_offer
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferArgs {
    title: String,
    description: String,
    discount: Option<f64>,
    valid_until: Option<String>,
    #[serde(default)]
    conditions: Vec<String>,
}

pub struct CreateMicroOfferTool;

#[async_trait]
impl Tool for CreateMicroOfferTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "create_micro_offer".to_string(),
            description: "Create a micro offer when the user shows interest but hesitates. Never offer discounts unless explicitly instructed".to_string(),
            input_schema: JsonSchema::object(
                vec![
                    ("title", PropertySchema::string("Title of the micro offer")),
                    ("description", PropertySchema::string("Description of the offer")),
                    ("discount", PropertySchema::number_between("Discount percentage", 0.0, 100.0)),
                    ("validUntil", PropertySchema::string("Offer expiry, free text or ISO date")),
                    ("conditions", PropertySchema::string_list("Conditions attached to the offer")),
                ],
                &["title", "description"],
            ),
        }
    }

    async fn execute(&self, arguments: Value, ctx: &mut ToolContext) -> Result<Value, ToolError> {
        let args: OfferArgs = parse_args(arguments)?;
        if let Some(discount) = args.discount {
            if !(0.0..=100.0).contains(&discount) {
                return Err(ToolError::InvalidArguments(format!(
                    "discount must be between 0 and 100, got {}",
                    discount
                )));
            }
        }

        let offer = MicroOffer {
            id: format!("offer_{}", current_timestamp_millis()),
            title: args.title,
            description: args.description,
            discount: args.discount,
            valid_until: args.valid_until,
            conditions: args.conditions,
        };

        ctx.state.micro_offers.push(offer.clone());
        ctx.state.last_offer = Some(offer.clone());

        Ok(json!({
            "success": true,
            "message": format!("Micro-offer created: {}", offer.title),
            "offer": offer,
        }))
    }
}
