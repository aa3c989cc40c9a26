use std::collections::BTreeSet;

use crate::config::ClusterConfig;
use crate::reconcile::{MutationIntent, Quota};

const IMMEDIATE: &str = "--immediate";

fn users_arg(users: &BTreeSet<String>) -> String {
    users.iter().cloned().collect::<Vec<_>>().join(",")
}

fn update_account(cluster: &ClusterConfig, account: &str, setting: String) -> Vec<String> {
    vec![
        IMMEDIATE.to_string(),
        "update".to_string(),
        "account".to_string(),
        account.to_string(),
        "set".to_string(),
        setting,
        "where".to_string(),
        cluster.selector(),
    ]
}

/// Association listing for the whole cluster.
pub fn show_associations(cluster: &ClusterConfig) -> Vec<String> {
    vec![
        "show".to_string(),
        "associations".to_string(),
        format!(
            "format=account,user,maxjobs,qos,{}",
            cluster.amount_attribute
        ),
        cluster.selector(),
        "--noheader".to_string(),
        "--parsable2".to_string(),
    ]
}

/// Users associated with a single account.
pub fn show_account_users(account: &str) -> Vec<String> {
    vec![
        "--noheader".to_string(),
        "--parsable2".to_string(),
        "show".to_string(),
        "account".to_string(),
        account.to_string(),
        "withassoc".to_string(),
        "format=user".to_string(),
    ]
}

/// Render an intent as the argument list of exactly one accounting command.
pub fn render(intent: &MutationIntent, cluster: &ClusterConfig) -> Vec<String> {
    match intent {
        MutationIntent::CreateAccount {
            account,
            parent,
            amount,
            default_qos,
            qos,
        } => vec![
            IMMEDIATE.to_string(),
            "add".to_string(),
            "account".to_string(),
            account.clone(),
            format!("parent={}", parent),
            format!("{}={}", cluster.amount_attribute, amount),
            format!("defaultqos={}", default_qos),
            format!("qos={}", qos.join(",")),
            "where".to_string(),
            cluster.selector(),
        ],
        MutationIntent::SetQuota { account, quota } => {
            let limit = match quota {
                Quota::Disabled => "maxjobs=0",
                Quota::Unlimited => "maxjobs=-1",
            };
            update_account(cluster, account, limit.to_string())
        }
        MutationIntent::AddMembers {
            account,
            users,
            default_account,
        } => {
            let mut args = vec![
                IMMEDIATE.to_string(),
                "add".to_string(),
                "user".to_string(),
                users_arg(users),
                format!("account={}", account),
                cluster.selector(),
            ];
            if *default_account {
                args.push(format!("defaultaccount={}", account));
            }
            args
        }
        MutationIntent::RemoveMembers { account, users } => vec![
            IMMEDIATE.to_string(),
            "remove".to_string(),
            "user".to_string(),
            users_arg(users),
            format!("account={}", account),
            cluster.selector(),
        ],
        MutationIntent::SetQos { account, qos } => {
            update_account(cluster, account, format!("qos={}", qos.join(",")))
        }
        MutationIntent::SetAmount { account, amount } => update_account(
            cluster,
            account,
            format!("{}={}", cluster.amount_attribute, amount),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> ClusterConfig {
        ClusterConfig::new("summit")
    }

    #[test]
    fn show_associations_selects_cluster_and_attribute() {
        assert_eq!(
            show_associations(&cluster()).join(" "),
            "show associations format=account,user,maxjobs,qos,grpcpumins cluster=summit --noheader --parsable2"
        );
    }

    #[test]
    fn create_account_command() {
        let intent = MutationIntent::CreateAccount {
            account: "ucb1".into(),
            parent: "ucballoc".into(),
            amount: 500,
            default_qos: "normal".into(),
            qos: vec!["normal".into(), "long".into(), "debug".into(), "gpu".into()],
        };
        assert_eq!(
            render(&intent, &cluster()).join(" "),
            "--immediate add account ucb1 parent=ucballoc grpcpumins=500 defaultqos=normal qos=normal,long,debug,gpu where cluster=summit"
        );
    }

    #[test]
    fn quota_commands() {
        let disable = MutationIntent::SetQuota {
            account: "ucb1".into(),
            quota: Quota::Disabled,
        };
        let enable = MutationIntent::SetQuota {
            account: "ucb1".into(),
            quota: Quota::Unlimited,
        };
        assert_eq!(
            render(&disable, &cluster()).join(" "),
            "--immediate update account ucb1 set maxjobs=0 where cluster=summit"
        );
        assert_eq!(
            render(&enable, &cluster()).join(" "),
            "--immediate update account ucb1 set maxjobs=-1 where cluster=summit"
        );
    }

    #[test]
    fn add_members_to_general_account_sets_default_account() {
        let intent = MutationIntent::AddMembers {
            account: "ucball".into(),
            users: ["carol".to_string(), "alice".to_string()].into(),
            default_account: true,
        };
        assert_eq!(
            render(&intent, &cluster()).join(" "),
            "--immediate add user alice,carol account=ucball cluster=summit defaultaccount=ucball"
        );
    }

    #[test]
    fn remove_members_and_attribute_updates() {
        let remove = MutationIntent::RemoveMembers {
            account: "ucb1".into(),
            users: ["bob".to_string()].into(),
        };
        let qos = MutationIntent::SetQos {
            account: "ucb1".into(),
            qos: vec!["normal".into(), "long".into()],
        };
        let amount = MutationIntent::SetAmount {
            account: "ucb1".into(),
            amount: 42,
        };
        assert_eq!(
            render(&remove, &cluster()).join(" "),
            "--immediate remove user bob account=ucb1 cluster=summit"
        );
        assert_eq!(
            render(&qos, &cluster()).join(" "),
            "--immediate update account ucb1 set qos=normal,long where cluster=summit"
        );
        assert_eq!(
            render(&amount, &cluster()).join(" "),
            "--immediate update account ucb1 set grpcpumins=42 where cluster=summit"
        );
    }
}
