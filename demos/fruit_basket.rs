//! A small class hierarchy: abstract fruit, two concrete fruits, and a
//! reference-counted singleton.
//!
//! This example demonstrates:
//! 1. Declaring classes with `Instance` and `extends!`
//! 2. Abstract methods, overrides and calling the inherited implementation
//! 3. Casting and ancestry queries
//! 4. Constructors and destructors that throw
//! 5. Lifecycle hooks printing every construction and destruction

use std::sync::Mutex;

use vtry::{
    class::{Class, Inherited, base_method},
    exception,
    hooks::{Hooks, builtin_hooks::StderrLifecycle},
    object::destroy_inherited,
    prelude::*,
    rtti,
};

#[repr(C)]
struct Fruit {
    base: Object,
    calories: i32,
}

static EAT: Method<fn(ObjRef<'_, Fruit>) -> String> = Method::new("eat");
static CALORIES: Method<fn(ObjRef<'_, Fruit>, i32) -> vtry::Result<i32>> = Method::new("calories");

fn fruit_calories(this: ObjRef<'_, Fruit>, quantity: i32) -> vtry::Result<i32> {
    Ok(this.calories * quantity)
}

// SAFETY: `repr(C)`, starts with `Object`.
unsafe impl Instance for Fruit {
    type Parent = Object;
    type Params = ();
    const NAME: &'static str = "Fruit";

    fn define(class: &mut ClassBuilder<Self>) {
        class
            .abstract_method(&EAT)
            .method(&CALORIES, fruit_calories);
    }
}
extends!(Fruit: Object);

#[repr(C)]
struct Orange {
    fruit: Fruit,
    pieces: i32,
}

static CUT: Method<fn(ObjMut<'_, Orange>, i32) -> vtry::Result<()>> = Method::new("cut");

fn orange_new(site: Site<'_, Orange>, calories: &i32) -> vtry::Result<Built<Orange>> {
    thrif!(*calories <= 0, "an orange has calories");
    let base = site.object();
    Ok(site.build(Orange {
        fruit: Fruit {
            base,
            calories: *calories,
        },
        pieces: 1,
    }))
}

fn orange_eat(this: ObjRef<'_, Fruit>) -> String {
    match this.try_cast::<Orange>() {
        Some(orange) if orange.pieces > 1 => format!("ate {} pieces of orange", orange.pieces),
        _ => "ate an orange".to_owned(),
    }
}

fn orange_calories(this: ObjRef<'_, Fruit>, quantity: i32) -> vtry::Result<i32> {
    thrif!(quantity > 20, "nobody eats that many oranges");
    match this.inherited::<Orange, _>(&CALORIES)? {
        Inherited::Implemented { method, .. } => method(this, quantity),
        Inherited::Exhausted => throw!(1, "no calorie table"),
    }
}

fn orange_cut(mut this: ObjMut<'_, Orange>, pieces: i32) -> vtry::Result<()> {
    thrif!(!(1..=8).contains(&pieces), "get yourself a melon");
    this.pieces = pieces;
    Ok(())
}

fn orange_destroy(this: ObjMut<'_, Object>) -> vtry::Result<()> {
    let orange = this.as_ref().cast::<Orange>()?;
    println!("  squeezing the remaining {} pieces", orange.pieces);
    destroy_inherited::<Orange>(this)
}

// SAFETY: `repr(C)`, starts with `Fruit`.
unsafe impl Instance for Orange {
    type Parent = Fruit;
    type Params = i32;
    const NAME: &'static str = "Orange";

    fn define(class: &mut ClassBuilder<Self>) {
        class
            .constructor(orange_new)
            .destructor(orange_destroy)
            .method(&EAT, orange_eat)
            .method(&CALORIES, orange_calories)
            .method(&CUT, orange_cut);
    }
}
extends!(Orange: Fruit, Object);

#[repr(C)]
struct Walnut {
    fruit: Fruit,
}

fn walnut_new(site: Site<'_, Walnut>, _: &()) -> vtry::Result<Built<Walnut>> {
    let base = site.object();
    Ok(site.build(Walnut {
        fruit: Fruit {
            base,
            calories: 400,
        },
    }))
}

// SAFETY: `repr(C)`, starts with `Fruit`.
unsafe impl Instance for Walnut {
    type Parent = Fruit;
    type Params = ();
    const NAME: &'static str = "Walnut";

    fn define(class: &mut ClassBuilder<Self>) {
        class.constructor(walnut_new);
    }
}
extends!(Walnut: Fruit, Object);

/// One shared instance per answer.
#[repr(C)]
struct Answer {
    base: RefCounted,
    yes: bool,
}

static ANSWERS: Mutex<[Option<Obj<Answer>>; 2]> = Mutex::new([None, None]);

fn answer_new(site: Site<'_, Answer>, yes: &bool) -> vtry::Result<Built<Answer>> {
    let Ok(mut answers) = ANSWERS.lock() else {
        throw!(1, "answer table poisoned");
    };
    let slot = &mut answers[usize::from(*yes)];
    if let Some(existing) = slot {
        // SAFETY: callers take their own reference before deleting.
        return Ok(site.substitute(unsafe { existing.alias() }));
    }
    thrif!(site.is_local(), "answers are shared");

    let base = site.object();
    let built = site.build(Answer {
        base: RefCounted::new(base),
        yes: *yes,
    });
    // SAFETY: heap instance; the table owns the reference taken below.
    let kept = unsafe { built.alias() };
    kept.as_ref().upcast::<RefCounted>().take();
    *slot = Some(kept);
    Ok(built)
}

// SAFETY: `repr(C)`, starts with `RefCounted`.
unsafe impl Instance for Answer {
    type Parent = RefCounted;
    type Params = bool;
    const NAME: &'static str = "Answer";

    fn define(class: &mut ClassBuilder<Self>) {
        class.constructor(answer_new);
    }
}
extends!(Answer: RefCounted, Object);

fn describe(fruit: ObjRef<'_, Fruit>) -> vtry::Result<()> {
    let class = fruit.class();
    println!(
        "{} ({}), {} calories for 3",
        class.name(),
        rtti::join_chain(class, " < ", false),
        fruit.method(&CALORIES)?(fruit, 3)?
    );
    println!("  {}", fruit.method(&EAT)?(fruit));
    Ok(())
}

fn introduced_by<F>(class: &'static Class, key: &'static Method<F>) -> vtry::Result<()> {
    let base = base_method(class, key)?;
    let kind = if base.slot.is_abstract() { " as abstract" } else { "" };
    println!("{} is introduced by {}{kind}", key.name(), base.class);
    Ok(())
}

fn basket() -> vtry::Result<()> {
    let mut orange = construct::<Orange>(&20)?;
    let walnut = construct::<Walnut>(&())?;

    Try::run(|| {
        describe(orange.as_ref().upcast())?;
        if let Some(cut) = orange.class().find_method(&CUT)
            && let Some(view) = orange.get_mut()
        {
            cut(view, 4)?;
        }
        describe(orange.as_ref().upcast())?;
        describe(walnut.as_ref().upcast())
    })
    .catch_all(|exception| {
        println!("  {}", exception.message());
        Ok(())
    })
    .end()?;

    introduced_by(orange.class(), &EAT)?;
    introduced_by(orange.class(), &CALORIES)?;
    introduced_by(orange.class(), &CUT)?;

    let total = with_local::<Orange, _>(&50, |orange| {
        let fruit = orange.as_ref().upcast::<Fruit>();
        fruit.method(&CALORIES)?(fruit, 2)
    })?;
    println!("two local oranges: {total} calories");

    Try::run(|| construct::<Orange>(&0).map(|_| ()))
        .catch_all(|failure| {
            print!("construction failed:\n{}", exception::format_trace());
            println!("  first entry: {}", failure.message());
            Ok(())
        })
        .end()?;

    let yes = construct::<Answer>(&true)?;
    yes.as_ref().upcast::<RefCounted>().take();
    let again = construct::<Answer>(&true)?;
    again.as_ref().upcast::<RefCounted>().take();
    println!(
        "answer {}: same instance twice: {}, {} references",
        yes.yes,
        yes.ptr_eq(&again),
        again.as_ref().upcast::<RefCounted>().refs()
    );
    delete(yes)?;
    delete(again)?;

    delete(orange)?;
    delete(walnut)?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    Hooks::new()
        .on_create(StderrLifecycle)
        .on_destroy(StderrLifecycle)
        .tag("fruit-basket demo")
        .install()
        .expect("failed to install hooks");

    Try::run(basket)
        .catch_all(|exception| {
            eprintln!("basket failed: {exception}");
            Ok(())
        })
        .end()
        .expect("every failure is handled above");
}
