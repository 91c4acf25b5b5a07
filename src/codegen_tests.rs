#[cfg(test)]
mod tests {
    use crate::context::{compile, CompileOptions, CompileResult};
    use crate::ast::Template;
    use serde_json::{json, Value};

    fn template(body: Value) -> Template {
        serde_json::from_value(json!({ "body": body })).unwrap()
    }

    fn compile_default(source: &str, body: Value) -> CompileResult {
        compile(source, &template(body), &CompileOptions::default())
    }

    fn compile_with(
        source: &str,
        body: Value,
        configure: impl FnOnce(&mut CompileOptions),
    ) -> CompileResult {
        let mut options = CompileOptions::default();
        configure(&mut options);
        compile(source, &template(body), &options)
    }

    fn this_path(original: &str, parts: Value) -> Value {
        json!({ "type": "PathExpression", "original": original, "parts": parts, "this": true })
    }

    fn local_path(original: &str, parts: Value) -> Value {
        json!({ "type": "PathExpression", "original": original, "parts": parts })
    }

    #[test]
    fn element_with_reactive_class_and_text_child() {
        let result = compile_default(
            "<div class={{this.x}}>Hi</div>",
            json!([{
                "type": "ElementNode",
                "tag": "div",
                "attributes": [{
                    "name": "class",
                    "value": { "type": "MustacheStatement", "path": this_path("this.x", json!(["x"])) }
                }],
                "children": [{ "type": "TextNode", "chars": "Hi" }]
            }]),
        );
        assert_eq!(
            result.code,
            "$_tag('div', [[['', () => this.x]], [], [['1', \"Hi\"]]], this)"
        );
        assert!(result.errors.is_empty());
    }

    #[test]
    fn if_block_with_else() {
        let result = compile_default(
            "{{#if this.a}}A{{else}}B{{/if}}",
            json!([{
                "type": "BlockStatement",
                "path": local_path("if", json!(["if"])),
                "params": [this_path("this.a", json!(["a"]))],
                "program": { "body": [{ "type": "TextNode", "chars": "A" }] },
                "inverse": { "body": [{ "type": "TextNode", "chars": "B" }] }
            }]),
        );
        assert_eq!(
            result.code,
            "$_if(this.a, (ctx1) => $_ucw((ctx2) => [\"A\"], ctx1), (ctx1) => $_ucw((ctx2) => [\"B\"], ctx1), this)"
        );
    }

    #[test]
    fn each_with_key_and_index_rewrite() {
        let result = compile_default(
            "{{#each this.items key=\"id\" as |it i|}}<li>{{it.name}} {{i}}</li>{{/each}}",
            json!([{
                "type": "BlockStatement",
                "path": local_path("each", json!(["each"])),
                "params": [this_path("this.items", json!(["items"]))],
                "hash": { "pairs": [{ "key": "key", "value": { "type": "StringLiteral", "value": "id" } }] },
                "program": {
                    "blockParams": ["it", "i"],
                    "body": [{
                        "type": "ElementNode",
                        "tag": "li",
                        "children": [
                            { "type": "MustacheStatement", "path": local_path("it.name", json!(["it", "name"])) },
                            { "type": "TextNode", "chars": " " },
                            { "type": "MustacheStatement", "path": local_path("i", json!(["i"])) }
                        ]
                    }]
                }
            }]),
        );
        assert_eq!(
            result.code,
            "$_each(this.items, (it, i, ctx1) => $_ucw((ctx2) => [$_tag('li', $_edp, ctx2, [it.name, \" \", i.value])], ctx1), \"id\", this)"
        );
    }

    #[test]
    fn each_with_stable_child_inlines_body() {
        let result = compile_default(
            "{{#each this.xs as |x|}}<li>{{x}}</li>{{/each}}",
            json!([{
                "type": "BlockStatement",
                "path": local_path("each", json!(["each"])),
                "params": [this_path("this.xs", json!(["xs"]))],
                "program": {
                    "blockParams": ["x"],
                    "body": [{
                        "type": "ElementNode",
                        "tag": "li",
                        "children": [
                            { "type": "MustacheStatement", "path": local_path("x", json!(["x"])) }
                        ]
                    }]
                }
            }]),
        );
        assert_eq!(
            result.code,
            "$_each(this.xs, (x, $index, ctx1) => [$_tag('li', [[], [], [['1', () => x]]], ctx1)], null, this)"
        );
        assert!(!result.code.contains("$_ucw"));
    }

    #[test]
    fn sync_each_uses_the_sync_entry_point() {
        let result = compile_default(
            "{{#each this.xs sync=true as |x|}}<li></li>{{/each}}",
            json!([{
                "type": "BlockStatement",
                "path": local_path("each", json!(["each"])),
                "params": [this_path("this.xs", json!(["xs"]))],
                "hash": { "pairs": [{ "key": "sync", "value": { "type": "BooleanLiteral", "value": true } }] },
                "program": {
                    "blockParams": ["x"],
                    "body": [{ "type": "ElementNode", "tag": "li" }]
                }
            }]),
        );
        assert_eq!(
            result.code,
            "$_eachSync(this.xs, (x, $index, ctx1) => [$_tag('li', $_edp, ctx1)], null, this)"
        );
    }

    #[test]
    fn unknown_helper_falls_back_to_maybe_helper() {
        let result = compile_with(
            "{{unknown a b foo=1}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("unknown", json!(["unknown"])),
                "params": [local_path("a", json!(["a"])), local_path("b", json!(["b"]))],
                "hash": { "pairs": [{ "key": "foo", "value": { "type": "NumberLiteral", "value": 1 } }] }
            }]),
            |options| {
                options.bindings.insert("a".to_string());
                options.bindings.insert("b".to_string());
            },
        );
        assert_eq!(result.code, "$_maybeHelper(\"unknown\", [a, b], {foo: 1})");
        assert!(result.warnings.iter().any(|w| w.code == "W001"));
    }

    #[test]
    fn component_with_arg_and_splat() {
        let result = compile_default(
            "<Comp @x={{this.y}} ...attributes />",
            json!([{
                "type": "ElementNode",
                "tag": "Comp",
                "selfClosing": true,
                "attributes": [
                    {
                        "name": "@x",
                        "value": { "type": "MustacheStatement", "path": this_path("this.y", json!(["y"])) }
                    },
                    { "name": "...attributes", "value": { "type": "TextNode", "chars": "" } }
                ]
            }]),
        );
        assert_eq!(
            result.code,
            "$_c(Comp, $_args({x: this.y}, {default_: false, default: (ctx) => []}, [[...$fw[0]], [...$fw[1]], [...$fw[2]]]), this)"
        );
        assert!(result.bindings.contains(&"Comp".to_string()));
    }

    #[test]
    fn unless_block_swaps_branches() {
        let result = compile_default(
            "{{#unless this.a}}A{{/unless}}",
            json!([{
                "type": "BlockStatement",
                "path": local_path("unless", json!(["unless"])),
                "params": [this_path("this.a", json!(["a"]))],
                "program": { "body": [{ "type": "TextNode", "chars": "A" }] }
            }]),
        );
        assert_eq!(
            result.code,
            "$_if(this.a, (ctx1) => [], (ctx1) => $_ucw((ctx2) => [\"A\"], ctx1), this)"
        );
    }

    #[test]
    fn unless_helper_becomes_if_with_swapped_args() {
        let result = compile_default(
            "{{unless this.a \"yes\" \"no\"}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("unless", json!(["unless"])),
                "params": [
                    this_path("this.a", json!(["a"])),
                    { "type": "StringLiteral", "value": "yes" },
                    { "type": "StringLiteral", "value": "no" }
                ]
            }]),
        );
        assert_eq!(result.code, "$__if(() => this.a, \"no\", \"yes\")");
    }

    #[test]
    fn reactive_built_ins_defer_helper_arguments() {
        let result = compile_default(
            "{{or this.a this.b}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("or", json!(["or"])),
                "params": [this_path("this.a", json!(["a"])), this_path("this.b", json!(["b"]))]
            }]),
        );
        assert_eq!(result.code, "$__or(() => this.a, () => this.b)");
    }

    #[test]
    fn local_binding_shadows_built_in() {
        let result = compile_with(
            "{{or this.a this.b}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("or", json!(["or"])),
                "params": [this_path("this.a", json!(["a"])), this_path("this.b", json!(["b"]))]
            }]),
            |options| {
                options.bindings.insert("or".to_string());
            },
        );
        assert_eq!(result.code, "or(this.a, this.b)");
        assert!(!result.code.contains("$__or"));
        assert!(result.bindings.contains(&"or".to_string()));
    }

    #[test]
    fn hash_helper_wraps_entries_in_thunks() {
        let result = compile_default(
            "{{hash name=this.n age=1}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("hash", json!(["hash"])),
                "hash": { "pairs": [
                    { "key": "name", "value": this_path("this.n", json!(["n"])) },
                    { "key": "age", "value": { "type": "NumberLiteral", "value": 1 } }
                ] }
            }]),
        );
        assert_eq!(result.code, "$__hash({name: () => this.n, age: () => 1})");
    }

    #[test]
    fn fn_helper_keeps_function_reference_unwrapped() {
        let result = compile_default(
            "{{fn this.save this.model}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("fn", json!(["fn"])),
                "params": [
                    this_path("this.save", json!(["save"])),
                    this_path("this.model", json!(["model"]))
                ]
            }]),
        );
        assert_eq!(result.code, "$__fn(this.save, this.model)");
    }

    #[test]
    fn has_block_binds_slots() {
        let zero = compile_default(
            "{{has-block}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("has-block", json!(["has-block"]))
            }]),
        );
        assert_eq!(zero.code, "$__hasBlock.bind(this, $slots)");

        let named = compile_default(
            "{{has-block \"header\"}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("has-block", json!(["has-block"])),
                "params": [{ "type": "StringLiteral", "value": "header" }]
            }]),
        );
        assert_eq!(named.code, "$__hasBlock.bind(this, $slots)(\"header\")");
    }

    #[test]
    fn debugger_helper_uses_call() {
        let result = compile_default(
            "{{debugger this.x}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("debugger", json!(["debugger"])),
                "params": [this_path("this.x", json!(["x"]))]
            }]),
        );
        assert_eq!(result.code, "$__debugger.call(this, this.x)");
    }

    #[test]
    fn component_keyword_helper_shape() {
        let result = compile_default(
            "{{component \"my-button\" label=\"Go\"}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("component", json!(["component"])),
                "params": [{ "type": "StringLiteral", "value": "my-button" }],
                "hash": { "pairs": [{ "key": "label", "value": { "type": "StringLiteral", "value": "Go" } }] }
            }]),
        );
        assert_eq!(
            result.code,
            "$__componentHelper([\"my-button\"], {label: \"Go\"})"
        );
    }

    #[test]
    fn in_element_block() {
        let result = compile_default(
            "{{#in-element this.target}}<div></div>{{/in-element}}",
            json!([{
                "type": "BlockStatement",
                "path": local_path("in-element", json!(["in-element"])),
                "params": [this_path("this.target", json!(["target"]))],
                "program": { "body": [{ "type": "ElementNode", "tag": "div" }] }
            }]),
        );
        assert_eq!(
            result.code,
            "$_inElement(this.target, (ctx1) => [$_tag('div', $_edp, ctx1)], this)"
        );
    }

    #[test]
    fn yield_lowers_to_slot_call() {
        let result = compile_default(
            "{{yield this.user to=\"header\"}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("yield", json!(["yield"])),
                "params": [this_path("this.user", json!(["user"]))],
                "hash": { "pairs": [{ "key": "to", "value": { "type": "StringLiteral", "value": "header" } }] }
            }]),
        );
        assert_eq!(
            result.code,
            "$_slot('header', () => [this.user], $slots, this)"
        );
    }

    #[test]
    fn dotted_component_tag_goes_dynamic() {
        let result = compile_default(
            "<Ui.Button />",
            json!([{ "type": "ElementNode", "tag": "Ui.Button", "selfClosing": true }]),
        );
        assert_eq!(
            result.code,
            "$_dc(() => Ui.Button, $_args({}, {default_: false, default: (ctx) => []}, [[], [], []]), this)"
        );
    }

    #[test]
    fn named_slots_emit_param_flags_and_closures() {
        let result = compile_default(
            "<Comp><:header as |t|><b>{{t}}</b></:header></Comp>",
            json!([{
                "type": "ElementNode",
                "tag": "Comp",
                "children": [{
                    "type": "ElementNode",
                    "tag": ":header",
                    "blockParams": ["t"],
                    "children": [{
                        "type": "ElementNode",
                        "tag": "b",
                        "children": [
                            { "type": "MustacheStatement", "path": local_path("t", json!(["t"])) }
                        ]
                    }]
                }]
            }]),
        );
        assert_eq!(
            result.code,
            "$_c(Comp, $_args({}, {default_: false, default: (ctx) => [], header_: true, header: (ctx, t) => [$_tag('b', [[], [], [['1', () => t]]], ctx)]}, [[], [], []]), this)"
        );
    }

    #[test]
    fn helper_manager_routes_known_calls() {
        let result = compile_with(
            "{{myHelper 1}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("myHelper", json!(["myHelper"])),
                "params": [{ "type": "NumberLiteral", "value": 1 }]
            }]),
            |options| {
                options.bindings.insert("myHelper".to_string());
                options.flags.with_helper_manager = true;
            },
        );
        assert_eq!(result.code, "$_maybeHelper(myHelper, [1], {})");
    }

    #[test]
    fn modifier_manager_routes_custom_modifiers() {
        let result = compile_with(
            "<div {{track this.id}}></div>",
            json!([{
                "type": "ElementNode",
                "tag": "div",
                "modifiers": [{
                    "path": local_path("track", json!(["track"])),
                    "params": [this_path("this.id", json!(["id"]))]
                }]
            }]),
            |options| {
                options.flags.with_modifier_manager = true;
            },
        );
        assert_eq!(
            result.code,
            "$_tag('div', [[], [], [['0', ($n) => $_maybeModifier(\"track\", $n, [this.id], {})]]], this)"
        );
    }

    #[test]
    fn custom_modifier_without_manager_calls_directly() {
        let result = compile_default(
            "<div {{autofocus}}></div>",
            json!([{
                "type": "ElementNode",
                "tag": "div",
                "modifiers": [{ "path": local_path("autofocus", json!(["autofocus"])) }]
            }]),
        );
        assert_eq!(
            result.code,
            "$_tag('div', [[], [], [['0', ($n) => autofocus($n)]]], this)"
        );
    }

    #[test]
    fn on_modifier_receives_event_and_node() {
        let result = compile_default(
            "<button {{on \"click\" this.save this.model}}></button>",
            json!([{
                "type": "ElementNode",
                "tag": "button",
                "modifiers": [{
                    "path": local_path("on", json!(["on"])),
                    "params": [
                        { "type": "StringLiteral", "value": "click" },
                        this_path("this.save", json!(["save"])),
                        this_path("this.model", json!(["model"]))
                    ]
                }]
            }]),
        );
        assert_eq!(
            result.code,
            "$_tag('button', [[], [], [['click', ($e, $n) => this.save($e, $n, this.model)]]], this)"
        );
    }

    #[test]
    fn eval_support_appends_context() {
        let result = compile_with(
            "{{unknown}}",
            json!([{
                "type": "MustacheStatement",
                "path": local_path("unknown", json!(["unknown"]))
            }]),
            |options| {
                options.flags.with_eval_support = true;
            },
        );
        assert_eq!(result.code, "$_maybeHelper(\"unknown\", [], {}, this)");
    }

    #[test]
    fn index_key_downgrades_to_identity() {
        let result = compile_default(
            "{{#each this.xs key=\"@index\" as |x|}}<li></li>{{/each}}",
            json!([{
                "type": "BlockStatement",
                "path": local_path("each", json!(["each"])),
                "params": [this_path("this.xs", json!(["xs"]))],
                "hash": { "pairs": [{ "key": "key", "value": { "type": "StringLiteral", "value": "@index" } }] },
                "program": {
                    "blockParams": ["x"],
                    "body": [{ "type": "ElementNode", "tag": "li" }]
                }
            }]),
        );
        assert!(result.code.contains("\"@identity\""));
        assert!(result.warnings.iter().any(|w| w.code == "W003"));
    }

    #[test]
    fn block_without_positional_arguments_errors() {
        let result = compile_default(
            "{{#if}}{{/if}}",
            json!([{
                "type": "BlockStatement",
                "path": local_path("if", json!(["if"])),
                "program": { "body": [] }
            }]),
        );
        assert_eq!(result.code, "[]");
        assert!(result.errors.iter().any(|e| e.code == "E001"));
    }

    #[test]
    fn deep_paths_use_optional_chaining() {
        let result = compile_default(
            "{{this.a.b.c}}",
            json!([{
                "type": "MustacheStatement",
                "path": this_path("this.a.b.c", json!(["a", "b", "c"]))
            }]),
        );
        assert_eq!(result.code, "this.a?.b?.c");
    }

    #[test]
    fn arg_paths_root_through_args_property() {
        let result = compile_default(
            "{{@user.name.first}}",
            json!([{
                "type": "MustacheStatement",
                "path": { "type": "PathExpression", "original": "@user.name.first", "parts": ["user", "name", "first"], "data": true }
            }]),
        );
        assert_eq!(result.code, "this[$args].user?.name?.first");
    }

    #[test]
    fn source_map_maps_path_root() {
        let source = "{{this.x}}";
        let result = compile_with(
            source,
            json!([{
                "type": "MustacheStatement",
                "path": {
                    "type": "PathExpression", "original": "this.x", "parts": ["x"], "this": true,
                    "loc": { "start": { "line": 1, "column": 2 }, "end": { "line": 1, "column": 8 } }
                },
                "loc": { "start": { "line": 1, "column": 0 }, "end": { "line": 1, "column": 10 } }
            }]),
            |options| {
                options.source_map.enabled = true;
                options.source_map.include_content = true;
                options.filename = Some("demo.hbs".to_string());
            },
        );
        let map = result.source_map.expect("map");
        assert!(map.names.contains(&"this".to_string()));
        assert!(!map.mappings.is_empty());
        assert_eq!(map.sources_content.unwrap()[0], source);

        // The root segment starts exactly at the root identifier's byte.
        fn find_root(node: &crate::serializer::MappingNode) -> Option<crate::ranges::SourceRange> {
            if node.name.as_deref() == Some("this") {
                return node.source;
            }
            node.children.iter().find_map(find_root)
        }
        let root = find_root(&result.mapping_tree).expect("root mapping");
        assert_eq!(root.start, 2);
        assert_eq!(root.end, 6);
    }

    #[test]
    fn inline_source_map_appends_data_uri() {
        let result = compile_with(
            "{{this.x}}",
            json!([{
                "type": "MustacheStatement",
                "path": this_path("this.x", json!(["x"]))
            }]),
            |options| {
                options.source_map.enabled = true;
                options.source_map.inline = true;
            },
        );
        assert!(result
            .code
            .contains("//# sourceMappingURL=data:application/json;base64,"));
    }

    #[test]
    fn formatted_output_is_stable() {
        let body = json!([{
            "type": "BlockStatement",
            "path": local_path("if", json!(["if"])),
            "params": [this_path("this.a", json!(["a"]))],
            "program": { "body": [
                { "type": "ElementNode", "tag": "div" },
                { "type": "ElementNode", "tag": "span" }
            ] }
        }]);
        let first = compile_with("{{#if this.a}}…{{/if}}", body.clone(), |options| {
            options.format.enabled = true;
        });
        let second = compile_with("{{#if this.a}}…{{/if}}", body, |options| {
            options.format.enabled = true;
        });
        assert_eq!(first.code, second.code);
        assert!(first.code.contains('\n'));
    }

    #[test]
    fn customize_component_name_renames_tags() {
        let rename = |name: &str| format!("{}Impl", name);
        let mut options = CompileOptions::default();
        options.customize_component_name = Some(&rename);
        let result = compile(
            "<Comp />",
            &template(json!([{ "type": "ElementNode", "tag": "Comp", "selfClosing": true }])),
            &options,
        );
        assert!(result.code.starts_with("$_c(CompImpl, "));
    }

    #[test]
    fn lexical_scope_marks_names_known() {
        let known = |name: &str| name == "formatDate";
        let mut options = CompileOptions::default();
        options.lexical_scope = Some(&known);
        let result = compile(
            "{{formatDate this.d}}",
            &template(json!([{
                "type": "MustacheStatement",
                "path": local_path("formatDate", json!(["formatDate"])),
                "params": [this_path("this.d", json!(["d"]))]
            }])),
            &options,
        );
        assert_eq!(result.code, "formatDate(this.d)");
        assert!(result.bindings.contains(&"formatDate".to_string()));
    }
}
