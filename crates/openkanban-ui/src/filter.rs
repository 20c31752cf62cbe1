use openkanban_core::{ProjectRegistry, Ticket};

/// A parsed filter query. `@name` tokens select projects (any of them may
/// match); the remaining tokens must all appear in the ticket title,
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    pub project_names: Vec<String>,
    pub title_terms: Vec<String>,
}

impl FilterQuery {
    pub fn parse(raw: &str) -> Self {
        let mut project_names = Vec::new();
        let mut title_terms = Vec::new();
        for token in raw.split_whitespace() {
            if let Some(name) = token.strip_prefix('@') {
                if !name.is_empty() {
                    project_names.push(name.to_lowercase());
                }
            } else {
                title_terms.push(token.to_lowercase());
            }
        }
        Self {
            project_names,
            title_terms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.project_names.is_empty() && self.title_terms.is_empty()
    }

    pub fn matches(&self, ticket: &Ticket, registry: &ProjectRegistry) -> bool {
        if !self.project_names.is_empty() {
            let project_name = registry
                .get(&ticket.project_id)
                .map(|project| project.name.to_lowercase());
            let selected = project_name
                .map(|name| self.project_names.iter().any(|wanted| &name == wanted))
                .unwrap_or(false);
            if !selected {
                return false;
            }
        }

        let title = ticket.title.to_lowercase();
        self.title_terms.iter().all(|term| title.contains(term))
    }
}

/// Live filter input plus the last committed query. The selection cursor is
/// orthogonal to this state; clearing restores the full ticket set.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    pub input: String,
    pub query: FilterQuery,
}

impl FilterState {
    pub fn commit(&mut self) {
        self.query = FilterQuery::parse(&self.input);
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.query = FilterQuery::default();
    }

    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }
}
