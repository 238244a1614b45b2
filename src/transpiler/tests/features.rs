//! Joins, raw fragments, condition grammar, and projection features.

use super::{compiler, compiler_for, param};
use crate::ast::columns::Projection;
use crate::ast::conditions::{Criteria, Sort};
use crate::ast::joins::{JoinRelation, JoinSpec};
use crate::ast::raw::raw;
use crate::ast::values::Value;
use crate::error::QuarryError;
use crate::transpiler::dml::{build_aggregate, build_select};
use crate::transpiler::Dialect;

#[test]
fn test_operator_table() {
    let cases: [(&str, Value, &str); 8] = [
        ("age[>]", Value::from(18), "`age` > :qk0"),
        ("age[>=]", Value::from(18), "`age` >= :qk0"),
        ("age[<]", Value::from(18), "`age` < :qk0"),
        ("age[<=]", Value::from(18), "`age` <= :qk0"),
        ("name[!]", Value::from("kim"), "`name` != :qk0"),
        ("name[~]", Value::from("%kim"), "(`name` LIKE :qk0L0)"),
        ("name[!~]", Value::from("%kim"), "(`name` NOT LIKE :qk0L0)"),
        ("code[REGEXP]", Value::from("^[A-Z]+"), "`code` REGEXP :qk0"),
    ];
    for (key, value, expected) in cases {
        let mut c = compiler();
        let criteria = Criteria::new().filter(key, value);
        let sql =
            build_select(&mut c, "t", None, &Projection::all(), Some(&criteria)).unwrap();
        assert_eq!(sql, format!("SELECT * FROM `t` WHERE {}", expected), "{key}");
    }
}

#[test]
fn test_null_and_list_dispatch() {
    let mut c = compiler();
    let criteria = Criteria::new()
        .filter("deleted_at", Value::Null)
        .filter("role[!]", vec!["admin", "bot"])
        .filter("parent[!]", Value::Null);
    let sql = build_select(&mut c, "users", None, &Projection::all(), Some(&criteria)).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` WHERE `deleted_at` IS NULL AND `role` NOT IN (:qk0_0, :qk0_1) AND `parent` IS NOT NULL"
    );
}

#[test]
fn test_like_wraps_bare_values() {
    let mut c = compiler();
    let criteria = Criteria::new().filter("name[~]", "kim");
    build_select(&mut c, "users", None, &Projection::all(), Some(&criteria)).unwrap();
    assert_eq!(param(&c, ":qk0L0"), Some(&Value::Text("%kim%".to_string())));
}

#[test]
fn test_like_list_combines_with_or() {
    let mut c = compiler();
    let criteria = Criteria::new().filter("name[~]", vec!["kim", "sam"]);
    let sql = build_select(&mut c, "users", None, &Projection::all(), Some(&criteria)).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` WHERE (`name` LIKE :qk0L0 OR `name` LIKE :qk0L1)"
    );
}

#[test]
fn test_between_and_not_between() {
    let mut c = compiler();
    let criteria = Criteria::new()
        .filter("age[<>]", vec![18, 65])
        .filter("score[><]", vec![0, 10]);
    let sql = build_select(&mut c, "users", None, &Projection::all(), Some(&criteria)).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` WHERE (`age` BETWEEN :qk0a AND :qk0b) AND (`score` NOT BETWEEN :qk1a AND :qk1b)"
    );
    assert_eq!(param(&c, ":qk0b"), Some(&Value::Int(65)));
}

#[test]
fn test_between_needs_two_bounds() {
    let mut c = compiler();
    let criteria = Criteria::new().filter("age[<>]", vec![18]);
    assert!(build_select(&mut c, "users", None, &Projection::all(), Some(&criteria)).is_err());
}

#[test]
fn test_unknown_operator_raises() {
    let mut c = compiler();
    let criteria = Criteria::new().filter("age[%]", 3);
    let err = build_select(&mut c, "users", None, &Projection::all(), Some(&criteria))
        .unwrap_err();
    assert!(matches!(err, QuarryError::UnsupportedOperator { .. }));
}

#[test]
fn test_column_to_column_comparison() {
    let mut c = compiler();
    let criteria = Criteria::new().filter("orders.created[<=]orders.shipped", Value::Null);
    let sql =
        build_select(&mut c, "orders", None, &Projection::all(), Some(&criteria)).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `orders` WHERE `orders`.`created` <= `orders`.`shipped`"
    );
    assert!(c.params.is_empty());
}

#[test]
fn test_nested_groups() {
    let mut c = compiler();
    let criteria = Criteria::new().filter("active", true).any(
        Criteria::new().filter("role", "admin").filter("level[>]", 8),
    );
    let sql = build_select(&mut c, "users", None, &Projection::all(), Some(&criteria)).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` WHERE `active` = :qk0 AND (`role` = :qk1 OR `level` > :qk2)"
    );
}

#[test]
fn test_raw_condition_merges_params() {
    let mut c = compiler();
    let criteria = Criteria::new()
        .raw_filter(raw("datetime(<stamp>) > :cutoff").bind(":cutoff", "2024-01-01"));
    let sql = build_select(&mut c, "events", None, &Projection::all(), Some(&criteria)).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `events` WHERE datetime(`stamp`) > :cutoff"
    );
    assert_eq!(
        param(&c, ":cutoff"),
        Some(&Value::Text("2024-01-01".to_string()))
    );
}

#[test]
fn test_raw_table_marker_resolution() {
    let mut c = compiler();
    c.prefix = "app_".to_string();
    let fragment = raw("SELECT <id> FROM <events> WHERE <kind> = 'x'");
    let sql = c.build_raw(&fragment).unwrap();
    // FROM marks the next token as a table, so the prefix applies there
    // and nowhere else. Tokens inside quotes pass through.
    assert_eq!(sql, "SELECT `id` FROM `app_events` WHERE `kind` = 'x'");
}

#[test]
fn test_left_join_with_on_pair() {
    let mut c = compiler();
    let joins = JoinSpec::new().join("[>]accounts", JoinRelation::on([("account_id", "id")]));
    let sql = build_select(&mut c, "users", Some(&joins), &Projection::all(), None).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` LEFT JOIN `accounts` ON `users`.`account_id` = `accounts`.`id`"
    );
}

#[test]
fn test_join_directions_and_using() {
    let mut c = compiler();
    let joins = JoinSpec::new()
        .join("[><]roles", JoinRelation::using(["role_id"]))
        .join("[<>]audits(a)", JoinRelation::on([("id", "user_id")]));
    let sql = build_select(&mut c, "users", Some(&joins), &Projection::all(), None).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` INNER JOIN `roles` USING (`role_id`) \
         FULL JOIN `audits` AS `a` ON `users`.`id` = `a`.`user_id`"
    );
}

#[test]
fn test_join_extra_conditions() {
    let mut c = compiler();
    let joins = JoinSpec::new().join(
        "[>]posts",
        JoinRelation::on([("id", "author_id")]).and("posts.published", true),
    );
    let sql = build_select(&mut c, "users", Some(&joins), &Projection::all(), None).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` LEFT JOIN `posts` ON `users`.`id` = `posts`.`author_id` AND `posts`.`published` = :qk0"
    );
}

#[test]
fn test_bad_join_key_is_skipped() {
    let mut c = compiler();
    let joins = JoinSpec::new()
        .join("posts", JoinRelation::using(["id"]))
        .join("[>]comments", JoinRelation::on([("id", "user_id")]));
    let sql = build_select(&mut c, "users", Some(&joins), &Projection::all(), None).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `users` LEFT JOIN `comments` ON `users`.`id` = `comments`.`user_id`"
    );
}

#[test]
fn test_star_with_join_rejected() {
    let mut c = compiler();
    let joins = JoinSpec::new().join("[>]posts", JoinRelation::using(["id"]));
    let proj = Projection::cols(["users.*"]);
    assert!(build_select(&mut c, "users", Some(&joins), &proj, None).is_err());
}

#[test]
fn test_projection_alias_distinct_and_raw() {
    let mut c = compiler();
    let proj = Projection::cols(["users.name(label)", "@city"])
        .push_raw("total[Int]", raw("COUNT(<id>)"));
    let sql = build_select(&mut c, "users", None, &proj, None).unwrap();
    assert_eq!(
        sql,
        "SELECT DISTINCT `city`,`users`.`name` AS `label`,COUNT(`id`) AS `total` FROM `users`"
    );
}

#[test]
fn test_grouped_projection_leads_with_key() {
    let mut c = compiler();
    let proj = Projection::grouped("id", ["name", "email"]);
    let sql = build_select(&mut c, "users", None, &proj, None).unwrap();
    assert_eq!(sql, "SELECT `id`,`name`,`email` FROM `users`");
}

#[test]
fn test_grouped_projection_key_accepts_token_grammar() {
    let mut c = compiler();
    let proj = Projection::grouped("user_id[Int]", ["name"]);
    let sql = build_select(&mut c, "orders", None, &proj, None).unwrap();
    assert_eq!(sql, "SELECT `user_id`,`name` FROM `orders`");

    let mut c = compiler();
    let proj = Projection::grouped("orders.user_id(uid)", ["name"]);
    let sql = build_select(&mut c, "orders", None, &proj, None).unwrap();
    assert_eq!(
        sql,
        "SELECT `orders`.`user_id` AS `uid`,`name` FROM `orders`"
    );
}

#[test]
fn test_aggregate_wraps_projection() {
    let mut c = compiler();
    let criteria = Criteria::new().filter("active", true);
    let sql = build_aggregate(
        &mut c,
        "COUNT",
        "users",
        None,
        None,
        Some(&criteria),
    )
    .unwrap();
    assert_eq!(sql, "SELECT COUNT(*) FROM `users` WHERE `active` = :qk0");

    let mut c = compiler();
    let proj = Projection::col("score");
    let sql = build_aggregate(&mut c, "AVG", "players", None, Some(&proj), None).unwrap();
    assert_eq!(sql, "SELECT AVG(`score`) FROM `players`");
}

#[test]
fn test_table_alias() {
    let mut c = compiler_for(Dialect::Postgres);
    let proj = Projection::cols(["u.name"]);
    let sql = build_select(&mut c, "users(u)", None, &proj, None).unwrap();
    assert_eq!(sql, "SELECT \"u\".\"name\" FROM \"users\" AS \"u\"");
}

#[test]
fn test_order_field_inlines_literals() {
    let mut c = compiler();
    let criteria =
        Criteria::new().order_field("state", [Value::from("new"), Value::from("done")]);
    let sql = build_select(&mut c, "tasks", None, &Projection::all(), Some(&criteria)).unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM `tasks` ORDER BY FIELD(`state`, 'new','done')"
    );
}

#[test]
fn test_order_bare_column() {
    let mut c = compiler();
    let criteria = Criteria::new().order_bare("created").order_by("id", Sort::Desc);
    let sql = build_select(&mut c, "posts", None, &Projection::all(), Some(&criteria)).unwrap();
    assert_eq!(sql, "SELECT * FROM `posts` ORDER BY `created`,`id` DESC");
}

#[test]
fn test_group_by_and_having() {
    let mut c = compiler();
    let criteria = Criteria::new()
        .group_by(["role"])
        .having("total[>]", 5);
    let proj = Projection::cols(["role"]).push_raw("total", raw("COUNT(<id>)"));
    let sql = build_select(&mut c, "users", None, &proj, Some(&criteria)).unwrap();
    assert_eq!(
        sql,
        "SELECT `role`,COUNT(`id`) AS `total` FROM `users` GROUP BY `role` HAVING `total` > :qk0"
    );
}
