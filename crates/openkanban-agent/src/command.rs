use openkanban_config::AgentConfig;

/// Ticket context substituted into an agent's init-prompt template.
#[derive(Debug, Clone, Copy)]
pub struct SpawnContext<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub branch_name: &'a str,
    pub base_branch: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    pub program: String,
    pub args: Vec<String>,
    pub environment: Vec<(String, String)>,
}

/// Builds the concrete command line for a configured agent.
///
/// On a first spawn the rendered init prompt is appended as the final
/// argument; on a respawn (`resume = true`) the agent's resume flags are
/// appended instead so the session restores its own context.
pub fn build_agent_command(
    agent: &AgentConfig,
    context: &SpawnContext<'_>,
    resume: bool,
    base_environment: Vec<(String, String)>,
) -> AgentCommand {
    let mut args = agent.args.clone();
    if resume {
        args.extend(agent.resume_args.iter().cloned());
    } else if !agent.init_prompt.is_empty() {
        args.push(render_prompt(&agent.init_prompt, context));
    }

    let mut environment = base_environment;
    for (key, value) in &agent.env {
        environment.retain(|(existing, _)| existing != key);
        environment.push((key.clone(), value.clone()));
    }

    AgentCommand {
        program: agent.command.clone(),
        args,
        environment,
    }
}

/// Substitutes the `{{.Title}}`, `{{.Description}}`, `{{.BranchName}}` and
/// `{{.BaseBranch}}` placeholders.
pub fn render_prompt(template: &str, context: &SpawnContext<'_>) -> String {
    template
        .replace("{{.Title}}", context.title)
        .replace("{{.Description}}", context.description)
        .replace("{{.BranchName}}", context.branch_name)
        .replace("{{.BaseBranch}}", context.base_branch)
}
