//! MCP service implementation using rmcp.
//!
//! Tools are not declared with the `#[tool]` macros: the catalog is a static
//! table, so `list_tools` publishes one tool per descriptor and `call_tool`
//! hands the raw argument object to the gateway.

use crate::gateway::Gateway;
use crate::models::ExecutionResult;
use crate::tools::{self, OperationDescriptor};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
        ToolAnnotations,
    },
    service::RequestContext,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct GatewayService {
    gateway: Arc<Gateway>,
    /// Tool list, built once from the catalog.
    tools: Arc<Vec<Tool>>,
}

impl GatewayService {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            tools: Arc::new(catalog_tools()),
        }
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }
}

/// One MCP tool per catalog operation.
pub fn catalog_tools() -> Vec<Tool> {
    tools::operations().map(tool_for).collect()
}

fn tool_for(op: &OperationDescriptor) -> Tool {
    let annotations = ToolAnnotations::new()
        .read_only(!op.dangerous)
        .destructive(op.dangerous);
    Tool::new(op.name, op.full_description(), Arc::new(op.input_schema())).annotate(annotations)
}

/// Unknown tool names are protocol errors, not operation results.
fn lookup(name: &str) -> Result<&'static OperationDescriptor, McpError> {
    tools::find(name)
        .ok_or_else(|| McpError::invalid_params(format!("unknown tool '{name}'"), None))
}

fn to_call_result(result: ExecutionResult) -> Result<CallToolResult, McpError> {
    if let ExecutionResult::Text { text } = result {
        return Ok(CallToolResult::success(vec![Content::text(text)]));
    }
    let is_error = result.is_error();
    let value =
        serde_json::to_value(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(if is_error {
        CallToolResult::structured_error(value)
    } else {
        CallToolResult::structured(value)
    })
}

impl ServerHandler for GatewayService {
    fn get_info(&self) -> ServerInfo {
        let policy = if self.gateway.policy().dangerous_enabled() {
            "Dangerous operations are ENABLED on this server."
        } else {
            "Dangerous operations are DISABLED on this server; they return policy_denied."
        };
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "pg-admin-mcp".to_owned(),
                title: Some("PostgreSQL Admin MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "PostgreSQL administration tools. Every tool name starts with `pg_`.\n\
                \n\
                ## Safety\n\
                - Listing, statistics, `pg_query` and `pg_explain_query` are read-only.\n\
                - Tools marked DANGEROUS change server, schema or data state and require \
                  ENABLE_DANGEROUS=true in the server environment.\n\
                - {policy}\n\
                \n\
                ## Results\n\
                Results carry a `kind`: row_set, scalar, status or error. CSV exports, SQL \
                dumps and table/markdown query output are returned as plain text.\n\
                \n\
                ## Tips\n\
                - `pg_delete_data` always needs `where_clause`; use `pg_truncate_table` to \
                  remove all rows.\n\
                - `pg_query` only accepts SELECT and appends `LIMIT max_rows` when missing."
            )),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools.to_vec()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let op = lookup(&request.name)?;
        let result = self.gateway.dispatch(op, request.arguments.as_ref()).await;
        to_call_result(result)
    }
}
