mod common;

use common::{Grower, Harvest};
use granary_core::{Link, PageRequest, RepoError, Repository, UnitOfWork};
use uuid::Uuid;

#[test]
fn create_and_get_roundtrip() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    let grower = Grower::new("Ines", "north");
    let stored = repo.create(&grower).unwrap();
    assert_eq!(stored, grower);

    let loaded = repo.get_by_id(grower.id).unwrap().unwrap();
    assert_eq!(loaded, grower);
}

#[test]
fn create_roundtrips_link_stubs() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Harvest>::new(&uow).unwrap();

    let grower_id = Uuid::new_v4();
    let mut harvest = Harvest::new("rye", 41);
    harvest.grower = Some(Link::to(grower_id));

    repo.create(&harvest).unwrap();

    let loaded = repo.get_by_id(harvest.id).unwrap().unwrap();
    assert_eq!(loaded.grower, Some(Link::to(grower_id)));
    assert!(!loaded.grower.unwrap().is_loaded());
}

#[test]
fn get_by_id_missing_returns_none() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    assert_eq!(repo.get_by_id(Uuid::new_v4()).unwrap(), None);
}

#[test]
fn create_duplicate_id_is_a_constraint_error() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    let grower = Grower::new("Ines", "north");
    repo.create(&grower).unwrap();

    let err = repo.create(&grower).unwrap_err();
    assert!(matches!(err, RepoError::Session(_)));
}

#[test]
fn update_replaces_the_whole_record() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    let mut grower = Grower::new("Ines", "north");
    repo.create(&grower).unwrap();

    grower.region = "east".to_string();
    let affected = repo.update(&grower).unwrap();
    assert_eq!(affected, 1);

    let loaded = repo.get_by_id(grower.id).unwrap().unwrap();
    assert_eq!(loaded.region, "east");
    assert_eq!(loaded.name, "Ines");
}

#[test]
fn update_preserves_fields_the_caller_did_not_touch() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Harvest>::new(&uow).unwrap();

    let mut harvest = Harvest::new("spelt", 12);
    harvest.grower = Some(Link::to(Uuid::new_v4()));
    repo.create(&harvest).unwrap();

    harvest.tonnes = 15;
    repo.update(&harvest).unwrap();

    let loaded = repo.get_by_id(harvest.id).unwrap().unwrap();
    assert_eq!(loaded.tonnes, 15);
    assert_eq!(loaded.grower, harvest.grower);
}

#[test]
fn update_missing_returns_not_found() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    let grower = Grower::new("Ines", "north");
    let err = repo.update(&grower).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == grower.id));
}

#[test]
fn delete_removes_the_record() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    let grower = Grower::new("Ines", "north");
    repo.create(&grower).unwrap();

    let affected = repo.delete(&grower).unwrap();
    assert_eq!(affected, 1);
    assert_eq!(repo.get_by_id(grower.id).unwrap(), None);
}

#[test]
fn delete_missing_returns_not_found() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    let grower = Grower::new("Ines", "north");
    let err = repo.delete(&grower).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == grower.id));
}

#[test]
fn delete_where_removes_every_match_in_one_flush() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    repo.create(&Grower::new("Ines", "north")).unwrap();
    repo.create(&Grower::new("Mara", "north")).unwrap();
    let keeper = Grower::new("Otto", "south");
    repo.create(&keeper).unwrap();

    let removed = repo.delete_where(|g| g.region == "north").unwrap();
    assert_eq!(removed, 2);

    let survivors = repo.all(&[]).unwrap();
    assert_eq!(survivors, vec![keeper]);
    assert!(repo.filter(|g| g.region == "north", &[]).unwrap().is_empty());
}

#[test]
fn delete_where_without_matches_returns_zero() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    repo.create(&Grower::new("Ines", "north")).unwrap();
    assert_eq!(repo.delete_where(|g| g.region == "west").unwrap(), 0);
    assert_eq!(repo.all(&[]).unwrap().len(), 1);
}

#[test]
fn all_returns_records_in_creation_order() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    let first = Grower::new("Zora", "north");
    let second = Grower::new("Abel", "south");
    let third = Grower::new("Mara", "east");
    repo.create(&first).unwrap();
    repo.create(&second).unwrap();
    repo.create(&third).unwrap();

    let names: Vec<String> = repo.all(&[]).unwrap().into_iter().map(|g| g.name).collect();
    assert_eq!(names, vec!["Zora", "Abel", "Mara"]);
}

#[test]
fn filter_matches_an_in_memory_reference_filter() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    for (name, region) in [
        ("Ines", "north"),
        ("Mara", "south"),
        ("Otto", "north"),
        ("Abel", "east"),
    ] {
        repo.create(&Grower::new(name, region)).unwrap();
    }

    let filtered = repo.filter(|g| g.region == "north", &[]).unwrap();
    let reference: Vec<Grower> = repo
        .all(&[])
        .unwrap()
        .into_iter()
        .filter(|g| g.region == "north")
        .collect();

    assert_eq!(filtered, reference);
    assert_eq!(filtered.len(), 2);
}

#[test]
fn find_one_returns_the_first_match_in_creation_order() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    let first = Grower::new("Ines", "north");
    let second = Grower::new("Mara", "north");
    repo.create(&first).unwrap();
    repo.create(&second).unwrap();

    let found = repo.find_one(|g| g.region == "north", &[]).unwrap();
    assert_eq!(found, Some(first));

    let missing = repo.find_one(|g| g.region == "west", &[]).unwrap();
    assert_eq!(missing, None);
}

#[test]
fn contains_reflects_the_predicate() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    repo.create(&Grower::new("Ines", "north")).unwrap();

    assert!(repo.contains(|g| g.name == "Ines").unwrap());
    assert!(!repo.contains(|g| g.name == "Mara").unwrap());
}

#[test]
fn execute_raw_runs_parametrized_statements_against_the_store() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    let grower = Grower::new("Ines", "north");
    repo.create(&grower).unwrap();
    repo.create(&Grower::new("Mara", "south")).unwrap();

    repo.execute_raw(
        "DELETE FROM records WHERE id = ?1 AND set_name = ?2;",
        &[
            serde_json::json!(grower.id.to_string()),
            serde_json::json!("growers"),
        ],
    )
    .unwrap();

    assert_eq!(repo.get_by_id(grower.id).unwrap(), None);
    assert_eq!(repo.all(&[]).unwrap().len(), 1);
}

#[test]
fn create_read_delete_paginate_scenario() {
    let uow = UnitOfWork::open_in_memory().unwrap();
    let repo = Repository::<Grower>::new(&uow).unwrap();

    let grower = Grower::new("Ines", "north");
    repo.create(&grower).unwrap();
    assert_eq!(repo.get_by_id(grower.id).unwrap(), Some(grower.clone()));

    let removed = repo.delete_where(|g| g.id == grower.id).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(repo.get_by_id(grower.id).unwrap(), None);

    let page = repo
        .filter_page(|g| g.id == grower.id, PageRequest::new(0, 10), &[])
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
}
