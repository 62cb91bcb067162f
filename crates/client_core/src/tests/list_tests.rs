use super::*;
use crate::test_support::{ids, named, page_key, page_of, related_key, ScriptedApi};

fn employees(api: &Arc<ScriptedApi>, page_size: u32) -> ListController {
    ListController::collection(api.clone(), Resource::Employees, page_size)
}

#[tokio::test]
async fn typing_a_search_term_renders_only_the_final_query() {
    let api = Arc::new(ScriptedApi::default());
    let mut list = employees(&api, 5);

    let initial = list.refresh().expect("dispatch");
    let typed_a = list.set_search_term("a").expect("dispatch");
    let cleared = list.set_search_term("").expect("dispatch");
    let retyped_a = list.set_search_term("A").expect("dispatch");
    let typed_an = list.set_search_term("an").expect("dispatch");

    let final_page = page_of(vec![named(1, "Anna"), named(4, "Jan")], 1, 2);
    api.release_page(
        &page_key(Resource::Employees, 0, 5, "an"),
        Ok(final_page.clone()),
    )
    .await;
    assert_eq!(typed_an.await.expect("join"), Settlement::Applied);

    // Earlier keystrokes complete afterwards and out of order.
    api.release_page(
        &page_key(Resource::Employees, 0, 5, "A"),
        Ok(page_of(vec![named(9, "Alex")], 1, 1)),
    )
    .await;
    api.release_page(
        &page_key(Resource::Employees, 0, 5, "a"),
        Ok(page_of(vec![named(8, "Karl")], 1, 1)),
    )
    .await;
    api.release_page(
        &page_key(Resource::Employees, 0, 5, ""),
        Err(FetchError::rejected(500, "late failure")),
    )
    .await;
    api.release_page(
        &page_key(Resource::Employees, 0, 5, ""),
        Ok(page_of(vec![named(7, "Zoe")], 3, 15)),
    )
    .await;
    for handle in [retyped_a, typed_a, cleared, initial] {
        assert_eq!(handle.await.expect("join"), Settlement::Discarded);
    }

    let view = list.view();
    assert_eq!(view.status, SlotStatus::Succeeded);
    assert_eq!(ids(&view.items), vec![1, 4]);
    assert_eq!(view.total_elements, 2);
    assert_eq!(view.search_term, "an");
    assert!(view.error.is_none());
}

#[tokio::test]
async fn changing_page_size_returns_to_first_page() {
    let api = Arc::new(ScriptedApi::default());
    api.can_page(
        page_key(Resource::Customers, 0, 5, ""),
        Ok(page_of(vec![named(1, "a")], 6, 30)),
    );
    api.can_page(
        page_key(Resource::Customers, 3, 5, ""),
        Ok(page_of(vec![named(16, "p")], 6, 30)),
    );
    api.can_page(
        page_key(Resource::Customers, 0, 10, ""),
        Ok(page_of(vec![named(1, "a")], 3, 30)),
    );
    let mut list = ListController::collection(api.clone(), Resource::Customers, 5);

    list.refresh().expect("dispatch").await.expect("join");
    list.set_page(3).expect("dispatch").await.expect("join");
    assert_eq!(list.page(), 3);

    let handle = list.set_page_size(10).expect("dispatch");
    assert_eq!(list.page(), 0);
    assert_eq!(list.query(), PageRequest::new(0, 10, ""));
    assert_eq!(handle.await.expect("join"), Settlement::Applied);
    assert_eq!(
        api.calls().last().map(String::as_str),
        Some(page_key(Resource::Customers, 0, 10, "").as_str())
    );
}

#[tokio::test]
async fn search_resets_page_to_zero() {
    let api = Arc::new(ScriptedApi::default());
    api.can_page(
        page_key(Resource::Employees, 0, 5, ""),
        Ok(page_of(vec![named(1, "a")], 4, 20)),
    );
    api.can_page(
        page_key(Resource::Employees, 2, 5, ""),
        Ok(page_of(vec![named(11, "k")], 4, 20)),
    );
    api.can_page(
        page_key(Resource::Employees, 0, 5, "k"),
        Ok(page_of(vec![named(11, "k")], 1, 1)),
    );
    let mut list = employees(&api, 5);
    list.refresh().expect("dispatch").await.expect("join");
    list.set_page(2).expect("dispatch").await.expect("join");

    list.set_search_term("k").expect("dispatch").await.expect("join");
    assert_eq!(list.page(), 0);
    assert_eq!(ids(&list.view().items), vec![11]);
}

#[tokio::test]
async fn out_of_range_pages_and_zero_size_are_ignored() {
    let api = Arc::new(ScriptedApi::default());
    api.can_page(
        page_key(Resource::Employees, 0, 5, ""),
        Ok(page_of(vec![named(1, "a")], 2, 6)),
    );
    let mut list = employees(&api, 5);

    assert!(list.set_page(0).is_none(), "nothing loaded yet");
    list.refresh().expect("dispatch").await.expect("join");

    assert!(list.set_page(2).is_none());
    assert!(list.previous_page().is_none());
    assert!(list.set_page_size(0).is_none());
    assert_eq!(list.page(), 0);
    assert_eq!(list.page_size(), 5);
    assert_eq!(api.calls().len(), 1);
}

#[tokio::test]
async fn empty_result_is_success_not_error() {
    let api = Arc::new(ScriptedApi::default());
    api.can_page(
        page_key(Resource::Notes, 0, 5, "nothing"),
        Ok(page_of(Vec::new(), 0, 0)),
    );
    let mut list = ListController::collection(api.clone(), Resource::Notes, 5);

    list.set_search_term("nothing")
        .expect("dispatch")
        .await
        .expect("join");

    let view = list.view();
    assert_eq!(view.status, SlotStatus::Succeeded);
    assert!(view.is_empty());
    assert!(view.error.is_none());
    assert!(!view.loading);
}

#[tokio::test]
async fn failure_surfaces_error_and_retry_reuses_parameters() {
    let api = Arc::new(ScriptedApi::default());
    let mut list = employees(&api, 5);
    let key = page_key(Resource::Employees, 0, 5, "x");

    let first = list.set_search_term("x").expect("dispatch");
    assert!(list.view().loading);
    api.release_page(&key, Err(FetchError::NetworkUnreachable("refused".into())))
        .await;
    first.await.expect("join");

    let view = list.view();
    assert!(!view.loading);
    assert!(view.error.as_ref().is_some_and(FetchError::is_unreachable));
    assert!(view.items.is_empty());

    let retry = list.retry().expect("dispatch");
    api.release_page(&key, Ok(page_of(vec![named(2, "Xaver")], 1, 1)))
        .await;
    retry.await.expect("join");

    assert_eq!(api.count(&key), 2);
    let view = list.view();
    assert!(view.error.is_none());
    assert_eq!(ids(&view.items), vec![2]);
}

#[tokio::test]
async fn oversized_server_page_is_capped() {
    let api = Arc::new(ScriptedApi::default());
    api.can_page(
        page_key(Resource::Employees, 0, 2, ""),
        Ok(page_of(vec![named(1, "a"), named(2, "b"), named(3, "c")], 2, 3)),
    );
    let mut list = employees(&api, 2);
    list.refresh().expect("dispatch").await.expect("join");
    assert_eq!(ids(&list.view().items), vec![1, 2]);
}

#[tokio::test]
async fn related_list_pages_and_searches_locally() {
    let api = Arc::new(ScriptedApi::default());
    api.can_related(
        related_key(Resource::Employees, 3, Resource::Customers),
        Ok(vec![
            named(10, "Anna"),
            named(11, "Bert"),
            named(12, "Hanna"),
            named(13, "Jan"),
        ]),
    );
    let mut list =
        ListController::related(api.clone(), Resource::Employees, Resource::Customers, 2);

    assert!(list.refresh().is_none(), "no parent bound");
    assert_eq!(list.status(), SlotStatus::Idle);

    list.bind_parent(Some(EntityId(3)));
    list.refresh().expect("dispatch").await.expect("join");
    let view = list.view();
    assert_eq!(ids(&view.items), vec![10, 11]);
    assert_eq!(view.total_pages, 2);
    assert_eq!(view.total_elements, 4);

    list.set_search_term("ann")
        .expect("dispatch")
        .await
        .expect("join");
    assert_eq!(ids(&list.view().items), vec![10, 12]);

    assert!(list.next_page().is_none(), "single page of matches");
    assert_eq!(list.page(), 0);
}

#[tokio::test]
async fn page_bounds_from_previous_search_do_not_apply_while_pending() {
    let api = Arc::new(ScriptedApi::default());
    api.can_page(
        page_key(Resource::Employees, 0, 5, ""),
        Ok(page_of(vec![named(1, "a")], 6, 30)),
    );
    let mut list = employees(&api, 5);
    list.refresh().expect("dispatch").await.expect("join");

    let narrowed = list.set_search_term("k").expect("dispatch");
    assert!(list.set_page(4).is_none(), "six pages belonged to the old search");
    assert_eq!(list.query(), PageRequest::new(0, 5, "k"));

    api.release_page(
        &page_key(Resource::Employees, 0, 5, "k"),
        Ok(page_of(vec![named(2, "Kim")], 1, 1)),
    )
    .await;
    assert_eq!(narrowed.await.expect("join"), Settlement::Applied);
    assert!(list.set_page(4).is_none());
    assert_eq!(
        api.calls(),
        vec![
            page_key(Resource::Employees, 0, 5, ""),
            page_key(Resource::Employees, 0, 5, "k"),
        ]
    );
}
