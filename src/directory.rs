//! In-memory user directory
use super::error::GatewayError;
use super::gateway::Directory;
use super::request::User;
use std::collections::BTreeSet;

/// A fixed roster of users, with one of them acting as the signed-in user.
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    users: Vec<User>,
    current_email: String,
    search_limit: usize,
}

impl StaticDirectory {
    pub fn new(users: Vec<User>, current_email: &str, search_limit: usize) -> Self {
        Self {
            users,
            current_email: current_email.to_string(),
            search_limit,
        }
    }

    pub fn for_user(&self, email: &str) -> Self {
        Self {
            current_email: email.to_string(),
            ..self.clone()
        }
    }

    pub fn users_in_department(&self, department: &str) -> Vec<User> {
        self.users
            .iter()
            .filter(|user| user.department.as_deref() == Some(department))
            .cloned()
            .collect()
    }
}

impl Directory for StaticDirectory {
    fn current_user_department(&self) -> Result<String, GatewayError> {
        Ok(self
            .users
            .iter()
            .find(|user| user.email == self.current_email)
            .and_then(|user| user.department.clone())
            .unwrap_or_default())
    }

    fn all_departments(&self) -> Result<Vec<String>, GatewayError> {
        let departments: BTreeSet<&str> = self
            .users
            .iter()
            .filter_map(|user| user.department.as_deref())
            .filter(|department| !department.is_empty())
            .collect();

        Ok(departments.into_iter().map(String::from).collect())
    }

    fn search_users(&self, term: &str, department: Option<&str>) -> Result<Vec<User>, GatewayError> {
        let term = term.to_lowercase();

        Ok(self
            .users
            .iter()
            .filter(|user| {
                user.display_name.to_lowercase().starts_with(&term)
                    || user.email.to_lowercase().starts_with(&term)
            })
            .filter(|user| department.is_none_or(|d| user.department.as_deref() == Some(d)))
            .take(self.search_limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> StaticDirectory {
        StaticDirectory::new(
            vec![
                User::new(1, "Ada Lovelace", "ada@contoso.com").with_department("Engineering"),
                User::new(2, "Adam Smith", "adam@contoso.com").with_department("Finance"),
                User::new(3, "Grace Hopper", "grace@contoso.com").with_department("Engineering"),
                User::new(4, "Nobody", "nobody@contoso.com"),
            ],
            "grace@contoso.com",
            50,
        )
    }

    #[test]
    fn departments_are_sorted_and_distinct() {
        assert_eq!(
            roster().all_departments().unwrap(),
            vec!["Engineering".to_string(), "Finance".to_string()]
        );
    }

    #[test]
    fn search_matches_prefix_within_department() {
        let directory = roster();

        let all_ad = directory.search_users("ad", None).unwrap();
        assert_eq!(all_ad.len(), 2);

        let engineers = directory.search_users("AD", Some("Engineering")).unwrap();
        assert_eq!(engineers.len(), 1);
        assert_eq!(engineers[0].email, "ada@contoso.com");

        let bounded = StaticDirectory::new(directory.users.clone(), "", 1);
        assert_eq!(bounded.search_users("ad", None).unwrap().len(), 1);
    }

    #[test]
    fn unknown_department_is_empty() {
        let directory = roster();
        assert_eq!(directory.current_user_department().unwrap(), "Engineering");
        assert_eq!(
            directory
                .for_user("nobody@contoso.com")
                .current_user_department()
                .unwrap(),
            ""
        );
        assert_eq!(directory.users_in_department("Engineering").len(), 2);
    }
}
