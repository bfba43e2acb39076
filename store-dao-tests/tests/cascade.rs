mod common;

use store_dao::{DaoError, error::Operation};
use store_dao_tests::{Order, Price, Product, Status, bread};

#[tokio::test]
async fn test_insert_persists_dependency_chain() {
    let factory = common::storefront(true).await;
    let mut session = factory.open_session().await.expect("Failed to open session");

    let mut order = Order {
        order_id: None,
        amount: 2,
        note: Some("ring twice".into()),
        product: bread(),
        status: Some(Status {
            id: None,
            name: "open".into(),
        }),
    };

    let id = session
        .dao::<Order>()
        .expect("Failed to create DAO")
        .insert(&mut order)
        .await
        .expect("Failed to insert order");

    assert_eq!(order.order_id, Some(id));
    assert!(order.product.id.is_some());
    assert!(order.product.price.id.is_some());
    assert!(order.status.as_ref().and_then(|e| e.id).is_some());

    let found = session
        .dao::<Order>()
        .expect("Failed to create DAO")
        .find(id)
        .await
        .expect("Failed to find order");

    assert_eq!(found, order);
}

#[tokio::test]
async fn test_optional_reference_left_empty() {
    let factory = common::storefront(true).await;
    let mut session = factory.open_session().await.expect("Failed to open session");
    let mut dao = session.dao::<Order>().expect("Failed to create DAO");

    let mut order = Order {
        order_id: None,
        amount: 1,
        note: None,
        product: bread(),
        status: None,
    };

    let id = dao.insert(&mut order).await.expect("Failed to insert order");
    let found = dao.find(id).await.expect("Failed to find order");

    assert_eq!(found.status, None);
    assert_eq!(found.note, None);
    assert_eq!(found, order);
}

#[tokio::test]
async fn test_delete_cascades_to_dependencies() {
    let factory = common::storefront(true).await;
    let mut session = factory.open_session().await.expect("Failed to open session");

    let mut order = Order {
        order_id: None,
        amount: 3,
        note: None,
        product: bread(),
        status: Some(Status {
            id: None,
            name: "open".into(),
        }),
    };

    let id = session
        .dao::<Order>()
        .expect("Failed to create DAO")
        .insert(&mut order)
        .await
        .expect("Failed to insert order");

    assert!(
        session
            .dao::<Order>()
            .expect("Failed to create DAO")
            .delete(id)
            .await
            .expect("Failed to delete order")
    );

    assert!(
        session
            .dao::<Order>()
            .expect("Failed to create DAO")
            .get_all()
            .await
            .expect("Failed to read orders")
            .is_empty()
    );
    assert!(
        session
            .dao::<Product>()
            .expect("Failed to create DAO")
            .get_all()
            .await
            .expect("Failed to read products")
            .is_empty()
    );
    assert!(
        session
            .dao::<Price>()
            .expect("Failed to create DAO")
            .get_all()
            .await
            .expect("Failed to read prices")
            .is_empty()
    );
    assert!(
        session
            .dao::<Status>()
            .expect("Failed to create DAO")
            .get_all()
            .await
            .expect("Failed to read statuses")
            .is_empty()
    );

    assert!(matches!(
        session
            .dao::<Order>()
            .expect("Failed to create DAO")
            .delete(id)
            .await,
        Err(DaoError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_failed_insert_rolls_back_dependencies() {
    let factory = common::storefront(true).await;
    let mut session = factory.open_session().await.expect("Failed to open session");

    let mut order = Order {
        order_id: None,
        amount: 0,
        note: None,
        product: bread(),
        status: None,
    };

    let result = session
        .dao::<Order>()
        .expect("Failed to create DAO")
        .insert(&mut order)
        .await;

    assert!(matches!(
        result,
        Err(DaoError::Store {
            entity: "Purchase",
            ..
        })
    ));
    assert!(!session.in_transaction());

    assert!(
        session
            .dao::<Product>()
            .expect("Failed to create DAO")
            .get_all()
            .await
            .expect("Failed to read products")
            .is_empty()
    );
    assert!(
        session
            .dao::<Price>()
            .expect("Failed to create DAO")
            .get_all()
            .await
            .expect("Failed to read prices")
            .is_empty()
    );
}

#[tokio::test]
async fn test_failed_insert_keeps_dependencies_without_transactions() {
    let factory = common::storefront(false).await;
    let mut session = factory.open_session().await.expect("Failed to open session");

    let mut order = Order {
        order_id: None,
        amount: 0,
        note: None,
        product: bread(),
        status: None,
    };

    assert!(
        session
            .dao::<Order>()
            .expect("Failed to create DAO")
            .insert(&mut order)
            .await
            .is_err()
    );

    assert_eq!(
        session
            .dao::<Product>()
            .expect("Failed to create DAO")
            .get_all()
            .await
            .expect("Failed to read products")
            .len(),
        1
    );
}

#[tokio::test]
async fn test_delete_of_shared_dependency_is_rolled_back() {
    let factory = common::storefront(true).await;
    let mut session = factory.open_session().await.expect("Failed to open session");

    let mut first = Order {
        order_id: None,
        amount: 1,
        note: None,
        product: bread(),
        status: None,
    };

    let first_id = session
        .dao::<Order>()
        .expect("Failed to create DAO")
        .insert(&mut first)
        .await
        .expect("Failed to insert first order");

    let mut second = Order {
        order_id: None,
        amount: 4,
        note: Some("same bread".into()),
        product: first.product.clone(),
        status: None,
    };

    session
        .dao::<Order>()
        .expect("Failed to create DAO")
        .insert(&mut second)
        .await
        .expect("Failed to insert second order");

    // The cascade removes the product the second order still references.
    let result = session
        .dao::<Order>()
        .expect("Failed to create DAO")
        .delete(first_id)
        .await;

    assert!(matches!(
        result,
        Err(DaoError::Store {
            entity: "Purchase",
            operation: Operation::Transaction,
            ..
        })
    ));
    assert!(!session.in_transaction());

    let orders = session
        .dao::<Order>()
        .expect("Failed to create DAO")
        .get_all()
        .await
        .expect("Failed to read orders");

    assert_eq!(orders, [first.clone(), second]);
    assert_eq!(
        session
            .dao::<Product>()
            .expect("Failed to create DAO")
            .get_all()
            .await
            .expect("Failed to read products"),
        [first.product.clone()]
    );

    let mut status = Status {
        id: None,
        name: "open".into(),
    };
    session
        .dao::<Status>()
        .expect("Failed to create DAO")
        .insert(&mut status)
        .await
        .expect("Failed to insert after rollback");

    session.close();

    // The pool holds a single connection, so this session gets the same one back.
    let mut session = factory.open_session().await.expect("Failed to reopen session");

    assert_eq!(
        session
            .dao::<Order>()
            .expect("Failed to create DAO")
            .get_all()
            .await
            .expect("Failed to read orders")
            .len(),
        2
    );
    assert_eq!(
        session
            .dao::<Status>()
            .expect("Failed to create DAO")
            .find(status.id.expect("Status was not inserted"))
            .await
            .expect("Failed to find status"),
        status
    );
}
