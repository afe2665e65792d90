use velora_config::Policy;

use crate::output::{print_policy, print_success};

pub fn validate(policy: &Policy) -> i32 {
    print_policy(policy);
    print_success(&format!(
        "Policy is valid ({} hub(s), {} scope(s))",
        policy.hubs().count(),
        policy.scopes().len()
    ));
    super::EXIT_OK
}
