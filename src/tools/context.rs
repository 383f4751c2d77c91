//! Channel, history and token lookup tools

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, JsonSchema, PropertySchema, Tool, ToolContext, ToolDescriptor, ToolError};
use crate::channels::Channel;

const HISTORY_SEARCH_LIMIT: usize = 5;

// ============================================================================
// get_channel_context
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ChannelArgs {
    channel: Option<String>,
}

pub struct GetChannelContextTool;

#[async_trait]
impl Tool for GetChannelContextTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_channel_context".to_string(),
            description: "Adapt CTAs to the platform: swipe for Instagram, click for WhatsApp, checkout for PWA".to_string(),
            input_schema: JsonSchema::object(
                vec![(
                    "channel",
                    PropertySchema::string("Channel to look up, defaults to the conversation's channel"),
                )],
                &[],
            ),
        }
    }

    async fn execute(&self, arguments: Value, ctx: &mut ToolContext) -> Result<Value, ToolError> {
        let args: ChannelArgs = parse_args(arguments)?;
        let channel = match args.channel {
            Some(name) => Channel::from_str(&name).unwrap_or_default(),
            None => ctx.state.channel.unwrap_or(ctx.channel),
        };
        let profile = channel.profile();

        Ok(json!({
            "channel": profile.name,
            "config": profile,
            "ctaStyle": profile.cta_style,
            "tone": profile.tone,
            "cta": profile.cta,
            "message": format!("Channel context for {}: {}", profile.name, profile.cta),
        }))
    }
}

// ============================================================================
// search_lead_history
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

pub struct SearchLeadHistoryTool;

#[async_trait]
impl Tool for SearchLeadHistoryTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "search_lead_history".to_string(),
            description: "Search lead history when the user seems familiar or you want to reference past conversations".to_string(),
            input_schema: JsonSchema::object(
                vec![("query", PropertySchema::string("Search query"))],
                &["query"],
            ),
        }
    }

    async fn execute(&self, arguments: Value, ctx: &mut ToolContext) -> Result<Value, ToolError> {
        let args: SearchArgs = parse_args(arguments)?;

        let Some(store) = ctx.store.as_ref() else {
            return Ok(json!({
                "success": false,
                "error": "history store not configured",
                "message": "Memory search failed",
            }));
        };

        match store
            .search_messages(&ctx.user_id, &args.query, HISTORY_SEARCH_LIMIT)
            .await
        {
            Ok(memories) => {
                let count = memories.len();
                Ok(json!({
                    "success": true,
                    "memories": memories,
                    "count": count,
                    "message": if count == 0 {
                        "No previous history found".to_string()
                    } else {
                        format!("Found {} relevant memories", count)
                    },
                }))
            }
            Err(e) => Ok(json!({
                "success": false,
                "error": e.to_string(),
                "message": "Memory search failed",
            })),
        }
    }
}

// ============================================================================
// check_neoflow_token
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct TokenArgs {
    address: Option<String>,
}

pub struct CheckNeoflowTokenTool;

#[async_trait]
impl Tool for CheckNeoflowTokenTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "check_neoflow_token".to_string(),
            description: "Check the Neoflow token when the user asks about tokens, balances, or blockchain-related information".to_string(),
            input_schema: JsonSchema::object(
                vec![("address", PropertySchema::string("Token address or user address"))],
                &[],
            ),
        }
    }

    // TODO: query the chain once the token contract exposes a balance endpoint
    async fn execute(&self, arguments: Value, _ctx: &mut ToolContext) -> Result<Value, ToolError> {
        let args: TokenArgs = parse_args(arguments)?;
        Ok(json!({
            "success": true,
            "address": args.address,
            "balance": "0",
            "message": "Token balance checked",
        }))
    }
}
